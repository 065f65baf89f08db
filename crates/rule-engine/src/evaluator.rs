//! 操作符评估器
//!
//! 纯函数，与数据来源无关：给定操作符、实际值集合与期望值，返回是否匹配。

use crate::error::{Result, RuleError};
use crate::operators::RuleOperator;
use crate::value::{ExpectedValue, RuleValue, fold_case};
use std::cmp::Ordering;

/// 操作符评估器
pub struct OperatorEvaluator;

impl OperatorEvaluator {
    /// 评估操作符
    ///
    /// # Arguments
    /// * `operator` - 操作符
    /// * `actual` - 规则从数据源取得的实际值（已去重）
    /// * `expected` - 表达式中配置的期望值
    /// * `case_sensitive` - 字符串比较是否区分大小写
    ///
    /// In/NotIn 的期望列表为空时视为未配置限制，直接返回 true。
    pub fn evaluate(
        operator: RuleOperator,
        actual: &[RuleValue],
        expected: &ExpectedValue,
        case_sensitive: bool,
    ) -> Result<bool> {
        match operator {
            RuleOperator::IsEmpty => Ok(actual.is_empty()),
            RuleOperator::IsNotEmpty => Ok(!actual.is_empty()),
            RuleOperator::In => {
                let list = Self::expected_list(operator, expected)?;
                if list.is_empty() {
                    return Ok(true);
                }
                Self::intersects(actual, list, case_sensitive)
            }
            RuleOperator::NotIn => {
                let list = Self::expected_list(operator, expected)?;
                if list.is_empty() {
                    return Ok(true);
                }
                Self::intersects(actual, list, case_sensitive).map(|r| !r)
            }
            RuleOperator::Equal
            | RuleOperator::NotEqual
            | RuleOperator::GreaterThan
            | RuleOperator::GreaterThanOrEqual
            | RuleOperator::LessThan
            | RuleOperator::LessThanOrEqual => {
                let value = Self::single_actual(operator, actual)?;
                let target = Self::expected_scalar(operator, expected)?;
                let ordering = value.compare(target, case_sensitive)?;

                Ok(match operator {
                    RuleOperator::Equal => ordering == Ordering::Equal,
                    RuleOperator::NotEqual => ordering != Ordering::Equal,
                    RuleOperator::GreaterThan => ordering == Ordering::Greater,
                    RuleOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                    RuleOperator::LessThan => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                })
            }
            RuleOperator::Contains => {
                let target = Self::expected_scalar(operator, expected)?;
                Self::contains(actual, target, case_sensitive)
            }
            RuleOperator::NotContains => {
                let target = Self::expected_scalar(operator, expected)?;
                Self::contains(actual, target, case_sensitive).map(|r| !r)
            }
            RuleOperator::StartsWith | RuleOperator::EndsWith => {
                let value = Self::single_actual(operator, actual)?;
                let target = Self::expected_scalar(operator, expected)?;
                let (s, affix) = match (value, target) {
                    (RuleValue::Str(s), RuleValue::Str(affix)) => (s, affix),
                    (RuleValue::Str(_), other) | (other, _) => {
                        return Err(RuleError::TypeMismatch {
                            expected: "string".to_string(),
                            actual: other.type_name().to_string(),
                        });
                    }
                };

                let (s, affix) = if case_sensitive {
                    (s.clone(), affix.clone())
                } else {
                    (fold_case(s), fold_case(affix))
                };

                Ok(if operator == RuleOperator::StartsWith {
                    s.starts_with(&affix)
                } else {
                    s.ends_with(&affix)
                })
            }
        }
    }

    /// 实际值与期望列表是否有交集
    fn intersects(actual: &[RuleValue], list: &[RuleValue], case_sensitive: bool) -> Result<bool> {
        for value in actual {
            for item in list {
                if value.equals(item, case_sensitive)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// 字符串做子串检查，其他类型做集合成员检查
    fn contains(actual: &[RuleValue], target: &RuleValue, case_sensitive: bool) -> Result<bool> {
        for value in actual {
            let hit = match (value, target) {
                (RuleValue::Str(s), RuleValue::Str(needle)) => {
                    if case_sensitive {
                        s.contains(needle.as_str())
                    } else {
                        fold_case(s).contains(&fold_case(needle))
                    }
                }
                _ => value.equals(target, case_sensitive)?,
            };
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn single_actual(operator: RuleOperator, actual: &[RuleValue]) -> Result<&RuleValue> {
        match actual {
            [value] => Ok(value),
            _ => Err(RuleError::ArityMismatch {
                operator: operator.to_string(),
                detail: format!("需要恰好 1 个实际值, 实际 {} 个", actual.len()),
            }),
        }
    }

    fn expected_scalar(operator: RuleOperator, expected: &ExpectedValue) -> Result<&RuleValue> {
        expected
            .as_scalar()
            .ok_or_else(|| RuleError::ArityMismatch {
                operator: operator.to_string(),
                detail: "期望值应为标量, 实际为列表".to_string(),
            })
    }

    fn expected_list(operator: RuleOperator, expected: &ExpectedValue) -> Result<&[RuleValue]> {
        expected.as_list().ok_or_else(|| RuleError::ArityMismatch {
            operator: operator.to_string(),
            detail: "期望值应为列表, 实际为标量".to_string(),
        })
    }
}
