//! 规则数据源
//!
//! 规则只通过 [`RuleDataStore`] 读取顾客的历史数据（心愿单、已购商品等），
//! 从不写入。两种访问方式：
//!
//! - `any_match`：集合下推，由存储回答一次存在性查询
//! - `open_pager`：按行 id 升序分页扫描候选集

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::pager::FastPager;

pub use memory::InMemoryRuleDataStore;
pub use postgres::PgRuleDataStore;

/// 候选集来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// 顾客心愿单中的商品
    Wishlist,
    /// 顾客历史订单中的商品行
    PurchasedItems,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wishlist => f.write_str("wishlist"),
            Self::PurchasedItems => f.write_str("purchased_items"),
        }
    }
}

/// 候选集查询条件
///
/// `store_id` 为 0 表示不限店铺。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateQuery {
    pub source: CandidateSource,
    pub customer_id: i64,
    pub store_id: i64,
}

impl CandidateQuery {
    pub fn new(source: CandidateSource, customer_id: i64, store_id: i64) -> Self {
        Self {
            source,
            customer_id,
            store_id,
        }
    }

    /// 行是否落在本次查询的店铺范围内
    pub fn in_store(&self, store_id: i64) -> bool {
        self.store_id == 0 || self.store_id == store_id
    }
}

/// 可下推比较的候选字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateField {
    ProductId,
    ManufacturerId,
}

impl fmt::Display for CandidateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductId => f.write_str("product_id"),
            Self::ManufacturerId => f.write_str("manufacturer_id"),
        }
    }
}

/// 候选行
///
/// `id` 是来源表的主键，也是分页的排序键。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub id: i64,
    pub product_id: i64,
    pub manufacturer_ids: Vec<i64>,
}

impl CandidateRow {
    /// 行在指定字段上的取值
    pub fn field_values(&self, field: CandidateField) -> Vec<i64> {
        match field {
            CandidateField::ProductId => vec![self.product_id],
            CandidateField::ManufacturerId => self.manufacturer_ids.clone(),
        }
    }
}

/// 规则数据源接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleDataStore: Send + Sync {
    /// 是否存在某行的 `field` 取值落在 `values` 中
    async fn any_match(
        &self,
        query: &CandidateQuery,
        field: CandidateField,
        values: &[i64],
    ) -> Result<bool>;

    /// 打开候选集分页读取器
    async fn open_pager(
        &self,
        query: &CandidateQuery,
        page_size: usize,
    ) -> Result<FastPager<CandidateRow>>;
}
