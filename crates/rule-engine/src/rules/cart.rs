//! 购物车规则
//!
//! 实际值直接取自上下文中的购物车快照，不访问数据源。

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::{Rule, evaluate_expression};
use crate::context::CartRuleContext;
use crate::error::Result;
use crate::models::{RuleExpression, RuleKind};
use crate::value::RuleValue;

/// 购物车包含指定商品
#[derive(Debug, Default)]
pub struct ProductInCartRule;

#[async_trait]
impl Rule for ProductInCartRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ProductInCart
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let cart = ctx.require_cart()?;
        let products: BTreeSet<i64> = cart.lines.iter().map(|l| l.product_id).collect();
        let actual: Vec<RuleValue> = products.into_iter().map(RuleValue::Int).collect();

        evaluate_expression(expr, &actual)
    }
}

/// 购物车总额
#[derive(Debug, Default)]
pub struct CartTotalRule;

#[async_trait]
impl Rule for CartTotalRule {
    fn kind(&self) -> RuleKind {
        RuleKind::CartTotal
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let cart = ctx.require_cart()?;
        evaluate_expression(expr, &[RuleValue::Decimal(cart.total())])
    }
}

/// 购物车商品件数
#[derive(Debug, Default)]
pub struct CartProductCountRule;

#[async_trait]
impl Rule for CartProductCountRule {
    fn kind(&self) -> RuleKind {
        RuleKind::CartProductCount
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let cart = ctx.require_cart()?;
        evaluate_expression(expr, &[RuleValue::Int(cart.item_count())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Cart, CartLine, Customer, StoreScope};
    use crate::error::RuleError;
    use crate::models::RuleDescriptor;
    use crate::operators::RuleOperator;
    use crate::value::ExpectedValue;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn ctx() -> CartRuleContext {
        CartRuleContext::new(Customer::new(1), StoreScope { id: 1 }).with_cart(Cart::new(vec![
            CartLine::new(5, 2, Decimal::from_str("12.50").unwrap()),
            CartLine::new(8, 1, Decimal::from_str("75.00").unwrap()),
        ]))
    }

    fn expr(kind: RuleKind, operator: RuleOperator, value: ExpectedValue) -> RuleExpression {
        RuleExpression::new(RuleDescriptor::new(kind), operator, value).unwrap()
    }

    #[tokio::test]
    async fn test_product_in_cart() {
        let rule = ProductInCartRule;
        assert!(
            rule.match_expression(&ctx(), &RuleExpression::is_in(RuleKind::ProductInCart, [8]))
                .await
                .unwrap()
        );
        assert!(
            rule.match_expression(
                &ctx(),
                &expr(
                    RuleKind::ProductInCart,
                    RuleOperator::IsNotEmpty,
                    ExpectedValue::default()
                )
            )
            .await
            .unwrap()
        );
    }

    #[tokio::test]
    async fn test_cart_total_with_integer_threshold() {
        // 总额 100.00 与整数阈值比较
        let rule = CartTotalRule;
        assert!(
            rule.match_expression(
                &ctx(),
                &expr(
                    RuleKind::CartTotal,
                    RuleOperator::GreaterThanOrEqual,
                    ExpectedValue::scalar(100)
                )
            )
            .await
            .unwrap()
        );
        assert!(
            !rule
                .match_expression(
                    &ctx(),
                    &expr(
                        RuleKind::CartTotal,
                        RuleOperator::GreaterThan,
                        ExpectedValue::scalar(100)
                    )
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_cart_product_count() {
        let rule = CartProductCountRule;
        assert!(
            rule.match_expression(
                &ctx(),
                &expr(
                    RuleKind::CartProductCount,
                    RuleOperator::Equal,
                    ExpectedValue::scalar(3)
                )
            )
            .await
            .unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_cart() {
        let ctx = CartRuleContext::new(Customer::new(1), StoreScope { id: 1 });
        let result = CartTotalRule
            .match_expression(
                &ctx,
                &expr(
                    RuleKind::CartTotal,
                    RuleOperator::GreaterThan,
                    ExpectedValue::scalar(0),
                ),
            )
            .await;
        assert!(matches!(result, Err(RuleError::DataUnavailable(_))));
    }
}
