//! 购物车规则引擎命令行入口

mod cli;

use clap::Parser;
use storefront_shared::config::AppConfig;
use storefront_shared::observability;

use cli::runner::EvaluateArgs;
use cli::{Cli, CommandRunner, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 统一加载配置：config/default.toml → config/{env}.toml → config/rule-engine.toml → 环境变量
    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 日志输出到 stderr，stdout 只输出评估结果
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    let runner = CommandRunner::new(config);

    match cli.command {
        Commands::Evaluate {
            rule_set,
            customer,
            store,
            cart,
            email,
            roles,
            fixtures,
        } => {
            runner
                .run_evaluate(EvaluateArgs {
                    rule_set,
                    customer,
                    store,
                    cart,
                    email,
                    roles,
                    fixtures,
                })
                .await?;
        }
        Commands::Validate { rule_set } => {
            runner.run_validate(&rule_set)?;
        }
    }

    Ok(())
}
