//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    // 标量比较
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,

    // 集合匹配
    In,
    NotIn,

    // 字符串 / 集合包含
    Contains,
    NotContains,
    StartsWith,
    EndsWith,

    // 空值检查
    IsEmpty,
    IsNotEmpty,
}

impl RuleOperator {
    /// 期望值必须为列表的操作符
    pub fn requires_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// 是否忽略期望值
    pub fn ignores_expected(&self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    /// 空逻辑组的取值：AND 为真，OR 为假
    pub fn identity(&self) -> bool {
        matches!(self, Self::And)
    }

    /// 能让整个逻辑组立即得出结论的子节点取值
    pub fn decisive(&self) -> bool {
        matches!(self, Self::Or)
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}
