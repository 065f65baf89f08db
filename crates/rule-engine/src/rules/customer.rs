//! 顾客与店铺规则

use async_trait::async_trait;

use super::{Rule, evaluate_expression};
use crate::context::CartRuleContext;
use crate::error::Result;
use crate::models::{RuleExpression, RuleKind};
use crate::value::RuleValue;

/// 顾客角色（按角色系统名匹配）
#[derive(Debug, Default)]
pub struct CustomerRoleRule;

#[async_trait]
impl Rule for CustomerRoleRule {
    fn kind(&self) -> RuleKind {
        RuleKind::CustomerRole
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let customer = ctx.require_customer()?;
        let roles: Vec<RuleValue> = customer
            .roles
            .iter()
            .map(|r| RuleValue::Str(r.clone()))
            .collect();

        evaluate_expression(expr, &roles)
    }
}

/// 顾客邮箱，未设置邮箱时实际值为空集
#[derive(Debug, Default)]
pub struct CustomerEmailRule;

#[async_trait]
impl Rule for CustomerEmailRule {
    fn kind(&self) -> RuleKind {
        RuleKind::CustomerEmail
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let customer = ctx.require_customer()?;
        let email: Vec<RuleValue> = customer
            .email
            .iter()
            .map(|e| RuleValue::Str(e.clone()))
            .collect();

        evaluate_expression(expr, &email)
    }
}

/// 当前店铺
#[derive(Debug, Default)]
pub struct StoreRule;

#[async_trait]
impl Rule for StoreRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Store
    }

    async fn match_expression(
        &self,
        ctx: &CartRuleContext,
        expr: &RuleExpression,
    ) -> Result<bool> {
        let store = ctx.require_store()?;
        evaluate_expression(expr, &[RuleValue::Int(store.id)])
    }
}
