//! CLI 命令定义

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 购物车规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "购物车规则评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 评估规则集并以 JSON 输出评估结果
    ///
    /// 默认从配置的 PostgreSQL 读取顾客历史数据；指定 `--fixtures` 时改用内存数据源。
    Evaluate {
        /// 规则集 JSON 文件
        #[arg(short, long)]
        rule_set: PathBuf,

        /// 顾客 ID
        #[arg(short, long)]
        customer: i64,

        /// 店铺 ID，0 表示不限店铺
        #[arg(short, long, default_value = "0")]
        store: i64,

        /// 购物车 JSON 文件
        #[arg(long)]
        cart: Option<PathBuf>,

        /// 顾客邮箱
        #[arg(long)]
        email: Option<String>,

        /// 顾客角色系统名，可重复指定
        #[arg(long = "role")]
        roles: Vec<String>,

        /// 内存数据源的数据文件（心愿单与已购商品）
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },

    /// 校验规则集中的描述符和表达式
    Validate {
        /// 规则集 JSON 文件
        #[arg(short, long)]
        rule_set: PathBuf,
    },
}
