//! 规则实现
//!
//! 每个 [`Rule`] 负责一种 [`RuleKind`]：从上下文或数据源取得实际值，
//! 再交给 [`OperatorEvaluator`] 判定。访问数据源的规则有两种策略：
//!
//! - 集合下推：In/NotIn 交给存储做一次存在性查询
//! - 分页扫描：逐页读取候选集并累积去重后的字段值，最后评估一次

pub mod cart;
pub mod customer;
pub mod purchased;
pub mod registry;
pub mod wishlist;

use async_trait::async_trait;
use std::collections::BTreeSet;
use storefront_shared::observability::metrics::{RULE_PAGES_READ_TOTAL, RULE_PUSHDOWN_QUERIES_TOTAL};
use tracing::debug;

use crate::context::CartRuleContext;
use crate::error::Result;
use crate::evaluator::OperatorEvaluator;
use crate::models::{RuleExpression, RuleKind};
use crate::operators::RuleOperator;
use crate::store::{CandidateField, CandidateQuery, RuleDataStore};
use crate::value::RuleValue;

pub use cart::{CartProductCountRule, CartTotalRule, ProductInCartRule};
pub use customer::{CustomerEmailRule, CustomerRoleRule, StoreRule};
pub use purchased::{PurchasedFromManufacturerRule, PurchasedProductRule};
pub use registry::RuleRegistry;
pub use wishlist::ProductOnWishlistRule;

/// 规则 Trait
///
/// 实现必须只读：不修改上下文，不写数据源，不跨请求缓存结果。
#[async_trait]
pub trait Rule: Send + Sync {
    /// 返回此规则处理的规则种类
    fn kind(&self) -> RuleKind;

    /// 判定表达式在当前上下文下是否成立
    async fn match_expression(&self, ctx: &CartRuleContext, expr: &RuleExpression)
    -> Result<bool>;
}

/// 用实际值评估表达式
pub(crate) fn evaluate_expression(expr: &RuleExpression, actual: &[RuleValue]) -> Result<bool> {
    OperatorEvaluator::evaluate(
        expr.operator(),
        actual,
        expr.value(),
        expr.descriptor().is_case_sensitive(),
    )
}

/// 集合下推
///
/// 期望列表为空时不访问存储，直接返回 true。NotIn 取存在性查询结果的否定，
/// 与评估器的 NotIn 语义一致。
pub(crate) async fn pushdown(
    store: &dyn RuleDataStore,
    kind: RuleKind,
    query: &CandidateQuery,
    field: CandidateField,
    expr: &RuleExpression,
) -> Result<bool> {
    if expr.value().as_list().is_some_and(|list| list.is_empty()) {
        debug!(rule = %kind, "期望列表为空，跳过下推查询");
        return Ok(true);
    }

    let values = expr.value().int_list()?;
    let any = if values.is_empty() {
        // 列表里只有非整数的小数，不可能命中任何行
        false
    } else {
        metrics::counter!(RULE_PUSHDOWN_QUERIES_TOTAL, "rule" => kind.as_str()).increment(1);
        store.any_match(query, field, &values).await?
    };

    Ok(match expr.operator() {
        RuleOperator::NotIn => !any,
        _ => any,
    })
}

/// 分页扫描候选集，返回去重后按升序排列的字段值
pub(crate) async fn scan(
    store: &dyn RuleDataStore,
    kind: RuleKind,
    query: &CandidateQuery,
    field: CandidateField,
    page_size: usize,
) -> Result<Vec<RuleValue>> {
    let mut pager = store.open_pager(query, page_size).await?;
    let mut values = BTreeSet::new();

    loop {
        let page = pager
            .read_next_page(|row| row.field_values(field), |row| row.id)
            .await?;
        values.extend(page.items.into_iter().flatten());

        if !page.has_more {
            break;
        }
    }

    let pages = pager.pages_read();
    metrics::counter!(RULE_PAGES_READ_TOTAL, "rule" => kind.as_str()).increment(pages as u64);
    debug!(rule = %kind, pages, distinct = values.len(), "候选集扫描完成");

    Ok(values.into_iter().map(RuleValue::Int).collect())
}

/// 按操作符选择策略：In/NotIn 下推，其余扫描后评估
pub(crate) async fn pushdown_or_scan(
    store: &dyn RuleDataStore,
    kind: RuleKind,
    query: &CandidateQuery,
    field: CandidateField,
    expr: &RuleExpression,
    page_size: usize,
) -> Result<bool> {
    match expr.operator() {
        RuleOperator::In | RuleOperator::NotIn => pushdown(store, kind, query, field, expr).await,
        _ => {
            let actual = scan(store, kind, query, field, page_size).await?;
            evaluate_expression(expr, &actual)
        }
    }
}

/// 由上下文构造候选集查询
pub(crate) fn candidate_query(
    ctx: &CartRuleContext,
    source: crate::store::CandidateSource,
) -> Result<CandidateQuery> {
    let customer = ctx.require_customer()?;
    let store = ctx.require_store()?;
    Ok(CandidateQuery::new(source, customer.id, store.id))
}
