//! 规则注册表
//!
//! 按 [`RuleKind`] 索引所有 [`Rule`] 实例，启动时构建一次，之后只读。
//!
//! ## 使用示例
//!
//! ```ignore
//! use rule_engine::rules::RuleRegistry;
//! use rule_engine::store::InMemoryRuleDataStore;
//! use std::sync::Arc;
//!
//! let registry = RuleRegistry::with_defaults(Arc::new(InMemoryRuleDataStore::new()), 4000);
//! let rule = registry.resolve(expr.descriptor())?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{
    CartProductCountRule, CartTotalRule, CustomerEmailRule, CustomerRoleRule,
    ProductInCartRule, ProductOnWishlistRule, PurchasedFromManufacturerRule,
    PurchasedProductRule, Rule, StoreRule,
};
use crate::error::{Result, RuleError};
use crate::models::{RuleDescriptor, RuleKind};
use crate::store::RuleDataStore;

/// 规则注册表
pub struct RuleRegistry {
    rules: HashMap<RuleKind, Arc<dyn Rule>>,
}

impl RuleRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// 注册一个规则
    ///
    /// 按规则的 `kind()` 索引，已存在的同类规则会被替换。
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> &mut Self {
        let kind = rule.kind();
        debug!(rule = %kind, "注册规则");
        self.rules.insert(kind, rule);
        self
    }

    /// 获取指定种类的规则
    pub fn get(&self, kind: RuleKind) -> Option<Arc<dyn Rule>> {
        self.rules.get(&kind).cloned()
    }

    /// 按描述符解析规则
    ///
    /// 名称未知或种类未注册时返回 `UnknownRuleDescriptor`。
    pub fn resolve(&self, descriptor: &RuleDescriptor) -> Result<Arc<dyn Rule>> {
        let kind = descriptor.kind()?;
        self.get(kind)
            .ok_or_else(|| RuleError::UnknownRuleDescriptor(descriptor.name().to_string()))
    }

    pub fn contains(&self, kind: RuleKind) -> bool {
        self.rules.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 创建包含全部内置规则的注册表
    ///
    /// 访问数据源的规则共享同一个 `store`，扫描时使用 `page_size` 作为页大小。
    pub fn with_defaults(store: Arc<dyn RuleDataStore>, page_size: usize) -> Self {
        let mut registry = Self::new();

        info!(page_size, "初始化内置规则");

        registry
            .register(Arc::new(ProductOnWishlistRule::new(store.clone(), page_size)))
            .register(Arc::new(PurchasedFromManufacturerRule::new(
                store.clone(),
                page_size,
            )))
            .register(Arc::new(PurchasedProductRule::new(store, page_size)))
            .register(Arc::new(ProductInCartRule))
            .register(Arc::new(CartTotalRule))
            .register(Arc::new(CartProductCountRule))
            .register(Arc::new(CustomerRoleRule))
            .register(Arc::new(CustomerEmailRule))
            .register(Arc::new(StoreRule));

        info!(rule_count = registry.len(), "内置规则初始化完成");

        registry
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
