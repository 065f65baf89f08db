//! PostgreSQL 数据源
//!
//! 候选集来自以下表：
//!
//! - `shopping_cart_items`：`cart_type = 2` 为心愿单
//! - `orders` / `order_items`：历史订单，`deleted = TRUE` 的订单不计入
//! - `product_manufacturers`：商品与制造商的多对多关联
//!
//! 导航关系全部显式 JOIN，不做延迟加载。分页扫描独占一个连接池连接，
//! 读取器释放时连接归还连接池。

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{FromRow, PgPool, Postgres};
use tracing::{debug, instrument};

use super::{CandidateField, CandidateQuery, CandidateRow, CandidateSource, RuleDataStore};
use crate::error::Result;
use crate::pager::{FastPager, PageCursor};

/// PostgreSQL 数据源
#[derive(Clone)]
pub struct PgRuleDataStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct CandidateRowRecord {
    id: i64,
    product_id: i64,
    manufacturer_ids: Vec<i64>,
}

impl From<CandidateRowRecord> for CandidateRow {
    fn from(r: CandidateRowRecord) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            manufacturer_ids: r.manufacturer_ids,
        }
    }
}

impl PgRuleDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 存在性查询语句
    fn exists_sql(source: CandidateSource, field: CandidateField) -> &'static str {
        match (source, field) {
            (CandidateSource::Wishlist, CandidateField::ProductId) => {
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM shopping_cart_items sci
                    WHERE sci.cart_type = 2
                      AND sci.customer_id = $1
                      AND ($2::BIGINT = 0 OR sci.store_id = $2)
                      AND sci.product_id = ANY($3)
                )
                "#
            }
            (CandidateSource::Wishlist, CandidateField::ManufacturerId) => {
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM shopping_cart_items sci
                    JOIN product_manufacturers pm ON pm.product_id = sci.product_id
                    WHERE sci.cart_type = 2
                      AND sci.customer_id = $1
                      AND ($2::BIGINT = 0 OR sci.store_id = $2)
                      AND pm.manufacturer_id = ANY($3)
                )
                "#
            }
            (CandidateSource::PurchasedItems, CandidateField::ProductId) => {
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM order_items oi
                    JOIN orders o ON o.id = oi.order_id
                    WHERE o.deleted = FALSE
                      AND o.customer_id = $1
                      AND ($2::BIGINT = 0 OR o.store_id = $2)
                      AND oi.product_id = ANY($3)
                )
                "#
            }
            (CandidateSource::PurchasedItems, CandidateField::ManufacturerId) => {
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM order_items oi
                    JOIN orders o ON o.id = oi.order_id
                    JOIN product_manufacturers pm ON pm.product_id = oi.product_id
                    WHERE o.deleted = FALSE
                      AND o.customer_id = $1
                      AND ($2::BIGINT = 0 OR o.store_id = $2)
                      AND pm.manufacturer_id = ANY($3)
                )
                "#
            }
        }
    }
}

#[async_trait]
impl RuleDataStore for PgRuleDataStore {
    #[instrument(skip(self, values), fields(source = %query.source, field = %field, values = values.len()))]
    async fn any_match(
        &self,
        query: &CandidateQuery,
        field: CandidateField,
        values: &[i64],
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(Self::exists_sql(query.source, field))
            .bind(query.customer_id)
            .bind(query.store_id)
            .bind(values)
            .fetch_one(&self.pool)
            .await?;

        debug!(exists, "集合下推查询完成");
        Ok(exists)
    }

    #[instrument(skip(self), fields(source = %query.source))]
    async fn open_pager(
        &self,
        query: &CandidateQuery,
        page_size: usize,
    ) -> Result<FastPager<CandidateRow>> {
        let conn = self.pool.acquire().await?;
        debug!("已为分页扫描获取独占连接");

        let cursor = PgCandidateCursor {
            conn,
            query: *query,
        };
        Ok(FastPager::new(Box::new(cursor), page_size))
    }
}

/// 键集分页游标，持有一个连接池连接
struct PgCandidateCursor {
    conn: PoolConnection<Postgres>,
    query: CandidateQuery,
}

impl PgCandidateCursor {
    fn page_sql(source: CandidateSource) -> &'static str {
        match source {
            CandidateSource::Wishlist => {
                r#"
                SELECT sci.id, sci.product_id,
                       COALESCE(
                           array_agg(pm.manufacturer_id ORDER BY pm.manufacturer_id)
                               FILTER (WHERE pm.manufacturer_id IS NOT NULL),
                           '{}'
                       )::BIGINT[] AS manufacturer_ids
                FROM shopping_cart_items sci
                LEFT JOIN product_manufacturers pm ON pm.product_id = sci.product_id
                WHERE sci.cart_type = 2
                  AND sci.customer_id = $1
                  AND ($2::BIGINT = 0 OR sci.store_id = $2)
                  AND sci.id > $3
                GROUP BY sci.id, sci.product_id
                ORDER BY sci.id
                LIMIT $4
                "#
            }
            CandidateSource::PurchasedItems => {
                r#"
                SELECT oi.id, oi.product_id,
                       COALESCE(
                           array_agg(pm.manufacturer_id ORDER BY pm.manufacturer_id)
                               FILTER (WHERE pm.manufacturer_id IS NOT NULL),
                           '{}'
                       )::BIGINT[] AS manufacturer_ids
                FROM order_items oi
                JOIN orders o ON o.id = oi.order_id
                LEFT JOIN product_manufacturers pm ON pm.product_id = oi.product_id
                WHERE o.deleted = FALSE
                  AND o.customer_id = $1
                  AND ($2::BIGINT = 0 OR o.store_id = $2)
                  AND oi.id > $3
                GROUP BY oi.id, oi.product_id
                ORDER BY oi.id
                LIMIT $4
                "#
            }
        }
    }
}

#[async_trait]
impl PageCursor<CandidateRow> for PgCandidateCursor {
    async fn fetch(&mut self, after: Option<i64>, limit: usize) -> Result<Vec<CandidateRow>> {
        let rows = sqlx::query_as::<_, CandidateRowRecord>(Self::page_sql(self.query.source))
            .bind(self.query.customer_id)
            .bind(self.query.store_id)
            .bind(after.unwrap_or(i64::MIN))
            .bind(limit as i64)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(CandidateRow::from).collect())
    }
}
