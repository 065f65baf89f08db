//! 评估上下文
//!
//! 每次评估请求构造一次，评估结束即丢弃。规则只能读取上下文，
//! 不能修改，也不能跨请求缓存（上下文携带请求级身份信息）。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};

/// 当前顾客
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    /// 顾客角色的系统名
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Customer {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            email: None,
            roles: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// 当前店铺范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreScope {
    pub id: i64,
}

/// 购物车行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn new(product_id: i64, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// 正在评估的购物车快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// 购物车总额（数量 × 单价之和）
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// 商品件数（数量之和）
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// 购物车规则评估上下文
#[derive(Debug, Clone, Default)]
pub struct CartRuleContext {
    customer: Option<Customer>,
    store: Option<StoreScope>,
    cart: Option<Cart>,
}

impl CartRuleContext {
    pub fn new(customer: Customer, store: StoreScope) -> Self {
        Self {
            customer: Some(customer),
            store: Some(store),
            cart: None,
        }
    }

    /// 不带任何引用的空上下文（匿名请求等场景）
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_cart(mut self, cart: Cart) -> Self {
        self.cart = Some(cart);
        self
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn store(&self) -> Option<&StoreScope> {
        self.store.as_ref()
    }

    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    /// 获取当前顾客，缺失时返回 `DataUnavailable`
    pub fn require_customer(&self) -> Result<&Customer> {
        self.customer
            .as_ref()
            .ok_or_else(|| RuleError::DataUnavailable("customer".to_string()))
    }

    /// 获取店铺范围，缺失时返回 `DataUnavailable`
    pub fn require_store(&self) -> Result<&StoreScope> {
        self.store
            .as_ref()
            .ok_or_else(|| RuleError::DataUnavailable("store".to_string()))
    }

    /// 获取购物车，缺失时返回 `DataUnavailable`
    pub fn require_cart(&self) -> Result<&Cart> {
        self.cart
            .as_ref()
            .ok_or_else(|| RuleError::DataUnavailable("cart".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cart_totals() {
        let cart = Cart::new(vec![
            CartLine::new(1, 2, Decimal::from_str("9.99").unwrap()),
            CartLine::new(2, 1, Decimal::from_str("20.02").unwrap()),
        ]);

        assert_eq!(cart.total(), Decimal::from_str("40.00").unwrap());
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_missing_references() {
        let ctx = CartRuleContext::empty();
        assert!(matches!(
            ctx.require_customer(),
            Err(RuleError::DataUnavailable(_))
        ));
        assert!(ctx.require_store().is_err());
        assert!(ctx.require_cart().is_err());

        let ctx = CartRuleContext::new(Customer::new(7), StoreScope { id: 1 });
        assert_eq!(ctx.require_customer().unwrap().id, 7);
        assert!(ctx.require_cart().is_err());
    }
}
