//! 规则取值类型
//!
//! 表达式右侧的期望值以及规则从数据源取得的实际值都使用 [`RuleValue`] 表示。
//! JSON 中整数解析为 `Int`，带小数的数值解析为 `Decimal`，`YYYY-MM-DD`
//! 格式的字符串解析为 `Date`，其余字符串解析为 `Str`。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, RuleError};

/// 标量取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Int(i64),
    Decimal(#[serde(with = "rust_decimal::serde::float")] Decimal),
    Date(NaiveDate),
    Str(String),
}

impl RuleValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::Str(_) => "string",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 比较两个取值
    ///
    /// 整数与小数之间按小数比较；字符串按序数比较，`case_sensitive` 为 false
    /// 时忽略大小写。其他类型组合返回 `TypeMismatch`。
    pub fn compare(&self, other: &RuleValue, case_sensitive: bool) -> Result<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            (Self::Int(a), Self::Decimal(b)) => Ok(Decimal::from(*a).cmp(b)),
            (Self::Decimal(a), Self::Int(b)) => Ok(a.cmp(&Decimal::from(*b))),
            (Self::Decimal(a), Self::Decimal(b)) => Ok(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Ok(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => {
                if case_sensitive {
                    Ok(a.as_str().cmp(b.as_str()))
                } else {
                    Ok(fold_case(a).cmp(&fold_case(b)))
                }
            }
            _ => Err(RuleError::TypeMismatch {
                expected: self.type_name().to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// 相等比较，语义同 [`RuleValue::compare`]
    pub fn equals(&self, other: &RuleValue, case_sensitive: bool) -> Result<bool> {
        Ok(self.compare(other, case_sensitive)? == Ordering::Equal)
    }
}

/// 序数比较前的大小写折叠
pub(crate) fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::Date(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl From<i64> for RuleValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for RuleValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<Decimal> for RuleValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDate> for RuleValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<&str> for RuleValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// 表达式右侧的期望值：标量或有序列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedValue {
    List(Vec<RuleValue>),
    Scalar(RuleValue),
}

impl ExpectedValue {
    /// 由任意可转换为 [`RuleValue`] 的元素构造列表
    pub fn list<T: Into<RuleValue>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn scalar(value: impl Into<RuleValue>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn as_list(&self) -> Option<&[RuleValue]> {
        match self {
            Self::List(values) => Some(values),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&RuleValue> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// 提取整数列表，用于下推到存储的集合查询
    ///
    /// 整数值的小数（如 `3.00`）按整数处理，与评估器的数值提升一致；
    /// 带小数部分的值不可能等于任何整数，直接略过。其他类型返回 `TypeMismatch`。
    pub fn int_list(&self) -> Result<Vec<i64>> {
        let values = self.as_list().ok_or_else(|| RuleError::TypeMismatch {
            expected: "list".to_string(),
            actual: "scalar".to_string(),
        })?;

        let mut ints = Vec::with_capacity(values.len());
        for v in values {
            match v {
                RuleValue::Int(i) => ints.push(*i),
                RuleValue::Decimal(d) => {
                    if d.fract().is_zero() {
                        if let Ok(i) = i64::try_from(*d) {
                            ints.push(i);
                        }
                    }
                }
                _ => {
                    return Err(RuleError::TypeMismatch {
                        expected: "integer".to_string(),
                        actual: v.type_name().to_string(),
                    });
                }
            }
        }
        Ok(ints)
    }
}

impl Default for ExpectedValue {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl fmt::Display for ExpectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{}", v),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}
