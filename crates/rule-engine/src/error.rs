//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("操作符与取值形态不匹配: {operator} {detail}")]
    ArityMismatch { operator: String, detail: String },

    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("上下文缺少必需数据: {0}")]
    DataUnavailable(String),

    #[error("未注册的规则描述符: {0}")]
    UnknownRuleDescriptor(String),

    #[error("规则评估已取消")]
    Cancelled,

    #[error("无效的表达式: {0}")]
    InvalidExpression(String),

    #[error("数据存储错误: {0}")]
    Store(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 获取错误码，用于日志和指标标签
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArityMismatch { .. } => "ARITY_MISMATCH",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::DataUnavailable(_) => "DATA_UNAVAILABLE",
            Self::UnknownRuleDescriptor(_) => "UNKNOWN_RULE_DESCRIPTOR",
            Self::Cancelled => "CANCELLED",
            Self::InvalidExpression(_) => "INVALID_EXPRESSION",
            Self::Store(_) => "STORE_ERROR",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    /// 该错误是否只影响所在分支
    ///
    /// 分支级错误在规则集内降级为条件不满足；其余错误（存储故障等）
    /// 交由调用方处理，引擎内部不做重试。
    pub fn is_branch_local(&self) -> bool {
        matches!(
            self,
            Self::ArityMismatch { .. }
                | Self::TypeMismatch { .. }
                | Self::DataUnavailable(_)
                | Self::UnknownRuleDescriptor(_)
                | Self::InvalidExpression(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
