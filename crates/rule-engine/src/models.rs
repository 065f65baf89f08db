//! 规则引擎领域模型

use crate::error::{Result, RuleError};
use crate::operators::{LogicalOperator, RuleOperator};
use crate::value::ExpectedValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 规则种类（封闭枚举，注册表按此路由到具体规则实现）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ProductOnWishlist,
    PurchasedFromManufacturer,
    PurchasedProduct,
    ProductInCart,
    CartTotal,
    CartProductCount,
    CustomerRole,
    CustomerEmail,
    Store,
}

impl RuleKind {
    pub const ALL: [RuleKind; 9] = [
        Self::ProductOnWishlist,
        Self::PurchasedFromManufacturer,
        Self::PurchasedProduct,
        Self::ProductInCart,
        Self::CartTotal,
        Self::CartProductCount,
        Self::CustomerRole,
        Self::CustomerEmail,
        Self::Store,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductOnWishlist => "product_on_wishlist",
            Self::PurchasedFromManufacturer => "purchased_from_manufacturer",
            Self::PurchasedProduct => "purchased_product",
            Self::ProductInCart => "product_in_cart",
            Self::CartTotal => "cart_total",
            Self::CartProductCount => "cart_product_count",
            Self::CustomerRole => "customer_role",
            Self::CustomerEmail => "customer_email",
            Self::Store => "store",
        }
    }
}

impl FromStr for RuleKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RuleError::UnknownRuleDescriptor(s.to_string()))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段描述符
///
/// 记录表达式由哪个规则处理以及字段标志。规则名在评估时才解析，
/// 未知名称只会让所在分支失败，不影响整个规则集的加载。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleDescriptor {
    rule: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    case_sensitive: bool,
}

impl RuleDescriptor {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            rule: kind.as_str().to_string(),
            case_sensitive: false,
        }
    }

    /// 按名称构造，名称不要求已注册
    pub fn named(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            case_sensitive: false,
        }
    }

    /// 字符串比较区分大小写
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.rule
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// 解析规则种类
    pub fn kind(&self) -> Result<RuleKind> {
        self.rule.parse()
    }
}

impl fmt::Display for RuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule)
    }
}

/// 表达式（叶子节点）
///
/// 构造后不可变。In/NotIn 的期望值始终是列表（可以为空），
/// 反序列化时同样校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExpression")]
pub struct RuleExpression {
    #[serde(flatten)]
    descriptor: RuleDescriptor,
    operator: RuleOperator,
    value: ExpectedValue,
}

#[derive(Deserialize)]
struct RawExpression {
    #[serde(flatten)]
    descriptor: RuleDescriptor,
    operator: RuleOperator,
    #[serde(default)]
    value: ExpectedValue,
}

impl TryFrom<RawExpression> for RuleExpression {
    type Error = RuleError;

    fn try_from(raw: RawExpression) -> Result<Self> {
        Self::new(raw.descriptor, raw.operator, raw.value)
    }
}

impl RuleExpression {
    pub fn new(
        descriptor: RuleDescriptor,
        operator: RuleOperator,
        value: ExpectedValue,
    ) -> Result<Self> {
        if operator.requires_list() && !value.is_list() {
            return Err(RuleError::InvalidExpression(format!(
                "{} {} 需要列表形式的期望值",
                descriptor, operator
            )));
        }
        if !operator.requires_list() && !operator.ignores_expected() && value.is_list() {
            return Err(RuleError::InvalidExpression(format!(
                "{} {} 需要标量形式的期望值",
                descriptor, operator
            )));
        }

        Ok(Self {
            descriptor,
            operator,
            value,
        })
    }

    /// In 表达式
    pub fn is_in<T: Into<crate::value::RuleValue>>(
        kind: RuleKind,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            descriptor: RuleDescriptor::new(kind),
            operator: RuleOperator::In,
            value: ExpectedValue::list(values),
        }
    }

    /// NotIn 表达式
    pub fn not_in<T: Into<crate::value::RuleValue>>(
        kind: RuleKind,
        values: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            descriptor: RuleDescriptor::new(kind),
            operator: RuleOperator::NotIn,
            value: ExpectedValue::list(values),
        }
    }

    pub fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    pub fn operator(&self) -> RuleOperator {
        self.operator
    }

    pub fn value(&self) -> &ExpectedValue {
        &self.value
    }
}

impl fmt::Display for RuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.descriptor, self.operator, self.value)
    }
}

/// 规则节点（表达式或嵌套规则集）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleNode {
    Expression(RuleExpression),
    Group(RuleSet),
}

impl From<RuleExpression> for RuleNode {
    fn from(expression: RuleExpression) -> Self {
        Self::Expression(expression)
    }
}

impl From<RuleSet> for RuleNode {
    fn from(set: RuleSet) -> Self {
        Self::Group(set)
    }
}

/// 规则集：以 AND/OR 组合的表达式树
///
/// 由调用方（折扣、配送方式等）持有，评估期间只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "new_rule_set_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "operator")]
    pub logical_operator: LogicalOperator,
    #[serde(default)]
    pub children: Vec<RuleNode>,
}

fn new_rule_set_id() -> String {
    Uuid::new_v4().to_string()
}

impl RuleSet {
    pub fn new(logical_operator: LogicalOperator, children: Vec<RuleNode>) -> Self {
        Self {
            id: new_rule_set_id(),
            name: String::new(),
            logical_operator,
            children,
        }
    }

    pub fn and(children: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::And, children)
    }

    pub fn or(children: Vec<RuleNode>) -> Self {
        Self::new(LogicalOperator::Or, children)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 遍历树中所有表达式
    pub fn expressions(&self) -> Vec<&RuleExpression> {
        let mut out = Vec::new();
        collect_expressions(&self.children, &mut out);
        out
    }

    /// 校验所有描述符都指向已知的规则种类
    ///
    /// 返回每个问题节点的路径和错误，空列表表示校验通过。
    pub fn validate(&self) -> Vec<(String, RuleError)> {
        let mut issues = Vec::new();
        validate_children(&self.children, "root", &mut issues);
        issues
    }
}

fn collect_expressions<'a>(children: &'a [RuleNode], out: &mut Vec<&'a RuleExpression>) {
    for child in children {
        match child {
            RuleNode::Expression(expr) => out.push(expr),
            RuleNode::Group(set) => collect_expressions(&set.children, out),
        }
    }
}

fn validate_children(children: &[RuleNode], path: &str, issues: &mut Vec<(String, RuleError)>) {
    for (i, child) in children.iter().enumerate() {
        let child_path = format!("{}.children[{}]", path, i);
        match child {
            RuleNode::Expression(expr) => {
                if let Err(e) = expr.descriptor().kind() {
                    issues.push((child_path, e));
                }
            }
            RuleNode::Group(set) => validate_children(&set.children, &child_path, issues),
        }
    }
}

/// 分支失败记录
#[derive(Debug, Clone, Serialize)]
pub struct BranchFailure {
    pub path: String,
    pub descriptor: String,
    pub code: String,
    pub message: String,
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    /// 至少一个叶子因取消或超时未能完成
    pub cancelled: bool,
    pub rule_set_id: String,
    pub rule_set_name: String,
    pub matched_expressions: Vec<String>,
    pub failures: Vec<BranchFailure>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new(rule_set_id: String, rule_set_name: String) -> Self {
        Self {
            matched: false,
            cancelled: false,
            rule_set_id,
            rule_set_name,
            matched_expressions: Vec::new(),
            failures: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }
}
