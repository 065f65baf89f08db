//! 购物车规则引擎
//!
//! 判定顾客与购物车是否满足折扣、配送方式等业务对象上配置的规则集，支持：
//! - JSON 规则集定义和解析
//! - 操作符评估（标量比较、集合匹配、字符串匹配、空值检查）
//! - 集合下推与分页扫描两种取数策略
//! - AND/OR 短路求值，可选兄弟分支并发评估
//! - 取消与超时预算

pub mod context;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod pager;
pub mod rules;
pub mod store;
pub mod value;

pub use context::{Cart, CartLine, CartRuleContext, Customer, StoreScope};
pub use error::{Result, RuleError};
pub use evaluator::OperatorEvaluator;
pub use executor::{ExecutorOptions, RuleSetExecutor};
pub use models::{
    BranchFailure, EvaluationResult, RuleDescriptor, RuleExpression, RuleKind, RuleNode, RuleSet,
};
pub use operators::{LogicalOperator, RuleOperator};
pub use pager::{FastPager, Page, PageCursor};
pub use rules::{Rule, RuleRegistry};
pub use store::{InMemoryRuleDataStore, PgRuleDataStore, RuleDataStore};
pub use value::{ExpectedValue, RuleValue};
