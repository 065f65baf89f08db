//! 命令执行器
//!
//! 将命令行参数转化为上下文、数据源和执行器调用。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{info, warn};

use rule_engine::{
    Cart, CartRuleContext, Customer, ExecutorOptions, InMemoryRuleDataStore, PgRuleDataStore,
    RuleDataStore, RuleRegistry, RuleSet, RuleSetExecutor, StoreScope,
};
use storefront_shared::config::AppConfig;
use storefront_shared::database::Database;

/// 内存数据源的数据文件格式
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixtures {
    wishlist: Vec<WishlistFixture>,
    purchases: Vec<PurchaseFixture>,
}

#[derive(Debug, Deserialize)]
struct WishlistFixture {
    customer_id: i64,
    #[serde(default)]
    store_id: i64,
    product_id: i64,
}

#[derive(Debug, Deserialize)]
struct PurchaseFixture {
    customer_id: i64,
    #[serde(default)]
    store_id: i64,
    product_id: i64,
    #[serde(default)]
    manufacturer_ids: Vec<i64>,
}

/// evaluate 子命令的参数
pub struct EvaluateArgs {
    pub rule_set: PathBuf,
    pub customer: i64,
    pub store: i64,
    pub cart: Option<PathBuf>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub fixtures: Option<PathBuf>,
}

/// 命令执行器
pub struct CommandRunner {
    config: AppConfig,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 执行 evaluate 命令
    pub async fn run_evaluate(&self, args: EvaluateArgs) -> Result<()> {
        let rule_set = load_rule_set(&args.rule_set)?;

        let mut customer = Customer::new(args.customer);
        if let Some(email) = args.email {
            customer = customer.with_email(email);
        }
        for role in args.roles {
            customer = customer.with_role(role);
        }

        let mut ctx = CartRuleContext::new(customer, StoreScope { id: args.store });
        if let Some(path) = &args.cart {
            let cart: Cart = read_json(path)?;
            ctx = ctx.with_cart(cart);
        }

        let mut database = None;
        let store: Arc<dyn RuleDataStore> = match &args.fixtures {
            Some(path) => {
                let store: Arc<dyn RuleDataStore> = Arc::new(load_fixtures(path)?);
                store
            }
            None => {
                let db = Database::connect(&self.config.database)
                    .await
                    .context("连接数据库失败")?;
                let latency = db
                    .health_check()
                    .await
                    .map_err(|e| anyhow!("数据库不可用 ({}): {}", e.code(), e))?;
                info!(latency_ms = latency.as_millis() as u64, "数据库连接就绪");
                let store: Arc<dyn RuleDataStore> = Arc::new(PgRuleDataStore::new(db.pool().clone()));
                database = Some(db);
                store
            }
        };

        let engine = &self.config.rule_engine;
        let registry = Arc::new(RuleRegistry::with_defaults(store, engine.page_size));
        let executor = RuleSetExecutor::new(registry, ExecutorOptions::from(engine));

        info!(
            rule_set_id = %rule_set.id,
            customer_id = args.customer,
            store_id = args.store,
            "开始评估规则集"
        );
        let outcome = executor.execute(&rule_set, &ctx).await;

        if let Some(database) = database {
            database.close().await;
        }

        let result = outcome.context("规则集评估失败")?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }

    /// 执行 validate 命令
    pub fn run_validate(&self, path: &Path) -> Result<()> {
        let rule_set = load_rule_set(path)?;
        let issues = rule_set.validate();

        if issues.is_empty() {
            info!(
                rule_set_id = %rule_set.id,
                expressions = rule_set.expressions().len(),
                "规则集校验通过"
            );
            println!("OK");
            return Ok(());
        }

        for (path, error) in &issues {
            warn!(path = %path, error = %error, "规则集校验失败");
            println!("{}: {}", path, error);
        }
        bail!("规则集包含 {} 个无效节点", issues.len())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("解析 JSON 失败: {}", path.display()))
}

fn load_rule_set(path: &Path) -> Result<RuleSet> {
    read_json(path)
}

fn load_fixtures(path: &Path) -> Result<InMemoryRuleDataStore> {
    let fixtures: Fixtures = read_json(path)?;
    let (wishlist, purchases) = (fixtures.wishlist.len(), fixtures.purchases.len());
    let store = InMemoryRuleDataStore::new();

    for item in fixtures.wishlist {
        store.add_wishlist_item(item.customer_id, item.store_id, item.product_id);
    }
    for item in fixtures.purchases {
        store.add_purchase(
            item.customer_id,
            item.store_id,
            item.product_id,
            item.manufacturer_ids,
        );
    }

    info!(wishlist, purchases, "已加载内存数据源");
    Ok(store)
}
