//! 心愿单商品规则

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use super::{Rule, candidate_query, evaluate_expression, scan};
use crate::context::CartRuleContext;
use crate::error::Result;
use crate::models::{RuleExpression, RuleKind};
use crate::store::{CandidateField, CandidateSource, RuleDataStore};

/// 心愿单商品规则
///
/// 实际值为顾客在当前店铺心愿单中的去重商品 id，始终走分页扫描。
pub struct ProductOnWishlistRule {
    store: Arc<dyn RuleDataStore>,
    page_size: usize,
}

impl ProductOnWishlistRule {
    pub fn new(store: Arc<dyn RuleDataStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }
}

#[async_trait]
impl Rule for ProductOnWishlistRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ProductOnWishlist
    }

    #[instrument(skip_all, fields(rule = "product_on_wishlist"))]
    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let query = candidate_query(ctx, CandidateSource::Wishlist)?;
        let products = scan(
            self.store.as_ref(),
            self.kind(),
            &query,
            CandidateField::ProductId,
            self.page_size,
        )
        .await?;

        evaluate_expression(expr, &products)
    }
}
