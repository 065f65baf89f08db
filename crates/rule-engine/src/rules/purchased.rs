//! 已购商品规则
//!
//! 候选集为顾客在当前店铺的历史订单商品行（已删除订单不计入）。
//! In/NotIn 下推到存储，其他操作符分页扫描。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use super::{Rule, candidate_query, pushdown_or_scan};
use crate::context::CartRuleContext;
use crate::error::Result;
use crate::models::{RuleExpression, RuleKind};
use crate::store::{CandidateField, CandidateSource, RuleDataStore};

/// 购买过指定制造商商品
pub struct PurchasedFromManufacturerRule {
    store: Arc<dyn RuleDataStore>,
    page_size: usize,
}

impl PurchasedFromManufacturerRule {
    pub fn new(store: Arc<dyn RuleDataStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }
}

#[async_trait]
impl Rule for PurchasedFromManufacturerRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PurchasedFromManufacturer
    }

    #[instrument(skip_all, fields(rule = "purchased_from_manufacturer", operator = %expr.operator()))]
    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let query = candidate_query(ctx, CandidateSource::PurchasedItems)?;
        pushdown_or_scan(
            self.store.as_ref(),
            self.kind(),
            &query,
            CandidateField::ManufacturerId,
            expr,
            self.page_size,
        )
        .await
    }
}

/// 购买过指定商品
pub struct PurchasedProductRule {
    store: Arc<dyn RuleDataStore>,
    page_size: usize,
}

impl PurchasedProductRule {
    pub fn new(store: Arc<dyn RuleDataStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }
}

#[async_trait]
impl Rule for PurchasedProductRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PurchasedProduct
    }

    #[instrument(skip_all, fields(rule = "purchased_product", operator = %expr.operator()))]
    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let query = candidate_query(ctx, CandidateSource::PurchasedItems)?;
        pushdown_or_scan(
            self.store.as_ref(),
            self.kind(),
            &query,
            CandidateField::ProductId,
            expr,
            self.page_size,
        )
        .await
    }
}
