//! 内存数据源
//!
//! 使用 DashMap 实现，适用于测试和本地运行。记录查询次数和读取页数，
//! 便于断言下推与扫描策略实际访问了多少次存储。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use super::{CandidateField, CandidateQuery, CandidateRow, CandidateSource, RuleDataStore};
use crate::error::Result;
use crate::pager::{FastPager, PageCursor, VecCursor};

#[derive(Debug, Clone)]
struct StoredRow {
    store_id: i64,
    row: CandidateRow,
}

/// 内存数据源
#[derive(Debug, Default)]
pub struct InMemoryRuleDataStore {
    /// (来源, 顾客 id) → 行
    rows: DashMap<(CandidateSource, i64), Vec<StoredRow>>,
    next_id: AtomicI64,
    queries: AtomicUsize,
    pagers_opened: AtomicUsize,
    pages_read: Arc<AtomicUsize>,
}

impl InMemoryRuleDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向顾客心愿单加入商品
    pub fn add_wishlist_item(&self, customer_id: i64, store_id: i64, product_id: i64) -> &Self {
        self.insert(
            CandidateSource::Wishlist,
            customer_id,
            store_id,
            product_id,
            Vec::new(),
        );
        self
    }

    /// 记录一条已购商品行
    pub fn add_purchase(
        &self,
        customer_id: i64,
        store_id: i64,
        product_id: i64,
        manufacturer_ids: Vec<i64>,
    ) -> &Self {
        self.insert(
            CandidateSource::PurchasedItems,
            customer_id,
            store_id,
            product_id,
            manufacturer_ids,
        );
        self
    }

    fn insert(
        &self,
        source: CandidateSource,
        customer_id: i64,
        store_id: i64,
        product_id: i64,
        manufacturer_ids: Vec<i64>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows
            .entry((source, customer_id))
            .or_default()
            .push(StoredRow {
                store_id,
                row: CandidateRow {
                    id,
                    product_id,
                    manufacturer_ids,
                },
            });
    }

    fn candidates(&self, query: &CandidateQuery) -> Vec<CandidateRow> {
        self.rows
            .get(&(query.source, query.customer_id))
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.in_store(r.store_id))
                    .map(|r| r.row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 存在性查询次数
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// 打开的分页读取器数量
    pub fn pagers_opened(&self) -> usize {
        self.pagers_opened.load(Ordering::SeqCst)
    }

    /// 已读取的页数
    pub fn pages_read(&self) -> usize {
        self.pages_read.load(Ordering::SeqCst)
    }

    /// 存储被访问的总次数
    pub fn access_count(&self) -> usize {
        self.query_count() + self.pagers_opened()
    }
}

struct CountingCursor {
    inner: VecCursor<CandidateRow>,
    pages_read: Arc<AtomicUsize>,
}

#[async_trait]
impl PageCursor<CandidateRow> for CountingCursor {
    async fn fetch(&mut self, after: Option<i64>, limit: usize) -> Result<Vec<CandidateRow>> {
        self.pages_read.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(after, limit).await
    }
}

#[async_trait]
impl RuleDataStore for InMemoryRuleDataStore {
    async fn any_match(
        &self,
        query: &CandidateQuery,
        field: CandidateField,
        values: &[i64],
    ) -> Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        Ok(self.candidates(query).iter().any(|row| {
            row.field_values(field)
                .iter()
                .any(|v| values.contains(v))
        }))
    }

    async fn open_pager(
        &self,
        query: &CandidateQuery,
        page_size: usize,
    ) -> Result<FastPager<CandidateRow>> {
        self.pagers_opened.fetch_add(1, Ordering::SeqCst);

        let cursor = CountingCursor {
            inner: VecCursor::new(self.candidates(query), |r: &CandidateRow| r.id),
            pages_read: self.pages_read.clone(),
        };
        Ok(FastPager::new(Box::new(cursor), page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryRuleDataStore {
        let store = InMemoryRuleDataStore::new();
        store
            .add_purchase(1, 10, 100, vec![3])
            .add_purchase(1, 20, 200, vec![4, 5])
            .add_wishlist_item(1, 10, 9);
        store
    }

    #[tokio::test]
    async fn test_any_match_respects_store_scope() {
        let store = seeded();

        let scoped = CandidateQuery::new(CandidateSource::PurchasedItems, 1, 10);
        assert!(
            store
                .any_match(&scoped, CandidateField::ManufacturerId, &[3])
                .await
                .unwrap()
        );
        assert!(
            !store
                .any_match(&scoped, CandidateField::ManufacturerId, &[5])
                .await
                .unwrap()
        );

        let all = CandidateQuery::new(CandidateSource::PurchasedItems, 1, 0);
        assert!(
            store
                .any_match(&all, CandidateField::ManufacturerId, &[5])
                .await
                .unwrap()
        );
        assert_eq!(store.query_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_empty() {
        let store = seeded();
        let query = CandidateQuery::new(CandidateSource::Wishlist, 99, 0);

        let mut pager = store.open_pager(&query, 10).await.unwrap();
        let page = pager.read_next_page(|r| r.product_id, |r| r.id).await.unwrap();

        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert_eq!(store.pages_read(), 1);
    }

    #[tokio::test]
    async fn test_pager_counts_pages() {
        let store = InMemoryRuleDataStore::new();
        for product_id in 0..5 {
            store.add_wishlist_item(1, 1, product_id);
        }

        let query = CandidateQuery::new(CandidateSource::Wishlist, 1, 1);
        let mut pager = store.open_pager(&query, 2).await.unwrap();
        let mut products = Vec::new();
        loop {
            let page = pager.read_next_page(|r| r.product_id, |r| r.id).await.unwrap();
            products.extend(page.items);
            if !page.has_more {
                break;
            }
        }

        assert_eq!(products, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.pagers_opened(), 1);
        assert_eq!(store.pages_read(), 3);
    }
}
