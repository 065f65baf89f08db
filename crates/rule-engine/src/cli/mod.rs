//! CLI 模块
//!
//! - `evaluate` - 对指定顾客、店铺和购物车评估规则集
//! - `validate` - 校验规则集文件
//!
//! # 使用示例
//!
//! ```bash
//! # 对 PostgreSQL 中的数据评估
//! rule-engine evaluate --rule-set discount.json --customer 42 --store 1 --cart cart.json
//!
//! # 使用本地数据文件评估
//! rule-engine evaluate --rule-set discount.json --customer 42 --store 1 --fixtures data.json
//!
//! # 校验规则集
//! rule-engine validate --rule-set discount.json
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
