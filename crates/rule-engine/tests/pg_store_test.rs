//! PostgreSQL 数据源集成测试
//!
//! 使用真实 PostgreSQL 校验集合下推与键集分页的 SQL，并与内存数据源逐项对照。
//! 测试只写入专用的顾客与商品编号，开始前先清理上一次残留的数据。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test --test pg_store_test -- --ignored
//! ```

use rule_engine::store::{CandidateField, CandidateQuery, CandidateSource};
use rule_engine::{
    CartRuleContext, Customer, ExecutorOptions, InMemoryRuleDataStore, PgRuleDataStore,
    RuleDataStore, RuleExpression, RuleKind, RuleRegistry, RuleSet, RuleSetExecutor, StoreScope,
};
use sqlx::PgPool;
use std::sync::Arc;

const CUSTOMER: i64 = 99_901;
const STORE: i64 = 1;
const OTHER_STORE: i64 = 2;

// 测试专用商品编号
const P1: i64 = 999_001;
const P2: i64 = 999_002;
const P3: i64 = 999_003;
const P4: i64 = 999_004;
const P5: i64 = 999_005;
const P6: i64 = 999_006;
const P7: i64 = 999_007;

// ==================== 辅助函数 ====================

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests")
}

/// 建表（已存在则跳过）
async fn ensure_schema(pool: &PgPool) {
    for ddl in [
        r#"
        CREATE TABLE IF NOT EXISTS shopping_cart_items (
            id BIGSERIAL PRIMARY KEY,
            cart_type INT NOT NULL,
            customer_id BIGINT NOT NULL,
            store_id BIGINT NOT NULL,
            product_id BIGINT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            customer_id BIGINT NOT NULL,
            store_id BIGINT NOT NULL,
            deleted BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS order_items (
            id BIGSERIAL PRIMARY KEY,
            order_id BIGINT NOT NULL,
            product_id BIGINT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS product_manufacturers (
            product_id BIGINT NOT NULL,
            manufacturer_id BIGINT NOT NULL
        )
        "#,
    ] {
        sqlx::query(ddl).execute(pool).await.expect("建表失败");
    }
}

/// 清理测试顾客和测试商品的数据
async fn cleanup(pool: &PgPool) {
    sqlx::query(
        "DELETE FROM order_items WHERE order_id IN (SELECT id FROM orders WHERE customer_id = $1)",
    )
    .bind(CUSTOMER)
    .execute(pool)
    .await
    .expect("清理订单明细失败");

    for sql in [
        "DELETE FROM orders WHERE customer_id = $1",
        "DELETE FROM shopping_cart_items WHERE customer_id = $1",
    ] {
        sqlx::query(sql)
            .bind(CUSTOMER)
            .execute(pool)
            .await
            .expect("清理测试数据失败");
    }

    sqlx::query("DELETE FROM product_manufacturers WHERE product_id BETWEEN $1 AND $2")
        .bind(P1)
        .bind(P7)
        .execute(pool)
        .await
        .expect("清理制造商关联失败");
}

async fn insert_cart_item(pool: &PgPool, cart_type: i32, store_id: i64, product_id: i64) {
    sqlx::query(
        "INSERT INTO shopping_cart_items (cart_type, customer_id, store_id, product_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(cart_type)
    .bind(CUSTOMER)
    .bind(store_id)
    .bind(product_id)
    .execute(pool)
    .await
    .expect("插入购物车条目失败");
}

async fn insert_order(pool: &PgPool, deleted: bool, products: &[i64]) {
    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (customer_id, store_id, deleted) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(CUSTOMER)
    .bind(STORE)
    .bind(deleted)
    .fetch_one(pool)
    .await
    .expect("插入订单失败");

    for product_id in products {
        sqlx::query("INSERT INTO order_items (order_id, product_id) VALUES ($1, $2)")
            .bind(order_id)
            .bind(product_id)
            .execute(pool)
            .await
            .expect("插入订单明细失败");
    }
}

/// 写入测试数据
///
/// - 心愿单：P1..P5 在门店 1，P6 在门店 2，P7 是普通购物车（不计入心愿单）
/// - 订单：P1、P2、P3 来自有效订单，P4 来自已删除订单
/// - 制造商：P1 → {7, 8}，P3 → {7}，P4 → {9}，P2 没有制造商
async fn seed(pool: &PgPool) {
    ensure_schema(pool).await;
    cleanup(pool).await;

    for product_id in [P1, P2, P3, P4, P5] {
        insert_cart_item(pool, 2, STORE, product_id).await;
    }
    insert_cart_item(pool, 2, OTHER_STORE, P6).await;
    insert_cart_item(pool, 1, STORE, P7).await;

    insert_order(pool, false, &[P1, P2, P3]).await;
    insert_order(pool, true, &[P4]).await;

    for (product_id, manufacturer_id) in [(P1, 7), (P1, 8), (P3, 7), (P4, 9)] {
        sqlx::query("INSERT INTO product_manufacturers (product_id, manufacturer_id) VALUES ($1, $2)")
            .bind(product_id)
            .bind(manufacturer_id)
            .execute(pool)
            .await
            .expect("插入制造商关联失败");
    }
}

/// 与数据库中有效数据等价的内存数据源
fn memory_store() -> InMemoryRuleDataStore {
    let store = InMemoryRuleDataStore::new();
    for product_id in [P1, P2, P3, P4, P5] {
        store.add_wishlist_item(CUSTOMER, STORE, product_id);
    }
    store
        .add_wishlist_item(CUSTOMER, OTHER_STORE, P6)
        .add_purchase(CUSTOMER, STORE, P1, vec![7, 8])
        .add_purchase(CUSTOMER, STORE, P2, vec![])
        .add_purchase(CUSTOMER, STORE, P3, vec![7]);
    store
}

// ==================== 测试 ====================

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_any_match_against_seeded_rows() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    seed(&pool).await;
    let store = PgRuleDataStore::new(pool.clone());

    let purchased = CandidateQuery::new(CandidateSource::PurchasedItems, CUSTOMER, STORE);
    let wishlist = CandidateQuery::new(CandidateSource::Wishlist, CUSTOMER, STORE);
    let wishlist_all = CandidateQuery::new(CandidateSource::Wishlist, CUSTOMER, 0);

    // 已删除订单不计入
    assert!(store.any_match(&purchased, CandidateField::ProductId, &[P2]).await.unwrap());
    assert!(!store.any_match(&purchased, CandidateField::ProductId, &[P4]).await.unwrap());
    assert!(!store.any_match(&purchased, CandidateField::ManufacturerId, &[9]).await.unwrap());
    assert!(store.any_match(&purchased, CandidateField::ManufacturerId, &[8, 100]).await.unwrap());

    // 门店范围与购物车类型
    assert!(!store.any_match(&wishlist, CandidateField::ProductId, &[P6]).await.unwrap());
    assert!(store.any_match(&wishlist_all, CandidateField::ProductId, &[P6]).await.unwrap());
    assert!(!store.any_match(&wishlist_all, CandidateField::ProductId, &[P7]).await.unwrap());
    assert!(store.any_match(&wishlist, CandidateField::ManufacturerId, &[7]).await.unwrap());

    cleanup(&pool).await;
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_pager_round_trip_across_pages() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    seed(&pool).await;
    let store = PgRuleDataStore::new(pool.clone());

    // 有效订单 3 行，页大小 2：一个满页加一个末页
    let query = CandidateQuery::new(CandidateSource::PurchasedItems, CUSTOMER, STORE);
    let mut pager = store.open_pager(&query, 2).await.unwrap();
    let mut rows = Vec::new();
    loop {
        let page = pager
            .read_next_page(|r| (r.id, r.product_id, r.manufacturer_ids.clone()), |r| r.id)
            .await
            .unwrap();
        rows.extend(page.items);
        if !page.has_more {
            break;
        }
    }

    assert_eq!(pager.pages_read(), 2);
    assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
    let projected: Vec<_> = rows.into_iter().map(|(_, p, m)| (p, m)).collect();
    assert_eq!(
        projected,
        vec![(P1, vec![7, 8]), (P2, vec![]), (P3, vec![7])]
    );

    // 全部门店的心愿单 6 行，页大小 2：三个满页加一个空的末页
    let query = CandidateQuery::new(CandidateSource::Wishlist, CUSTOMER, 0);
    let mut pager = store.open_pager(&query, 2).await.unwrap();
    let mut products = Vec::new();
    loop {
        let page = pager.read_next_page(|r| r.product_id, |r| r.id).await.unwrap();
        products.extend(page.items);
        if !page.has_more {
            break;
        }
    }

    assert_eq!(pager.pages_read(), 4);
    assert_eq!(products, vec![P1, P2, P3, P4, P5, P6]);

    cleanup(&pool).await;
}

#[tokio::test]
#[ignore] // 需要 PostgreSQL
async fn test_pg_store_agrees_with_memory_store() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    seed(&pool).await;

    let pg = RuleSetExecutor::new(
        Arc::new(RuleRegistry::with_defaults(
            Arc::new(PgRuleDataStore::new(pool.clone())),
            2,
        )),
        ExecutorOptions::default(),
    );
    let memory = RuleSetExecutor::new(
        Arc::new(RuleRegistry::with_defaults(Arc::new(memory_store()), 2)),
        ExecutorOptions::default(),
    );
    let ctx = CartRuleContext::new(Customer::new(CUSTOMER), StoreScope { id: STORE });

    let expressions = [
        RuleExpression::is_in(RuleKind::PurchasedFromManufacturer, [7]),
        RuleExpression::not_in(RuleKind::PurchasedFromManufacturer, [7]),
        RuleExpression::is_in(RuleKind::PurchasedFromManufacturer, [9]),
        RuleExpression::not_in(RuleKind::PurchasedFromManufacturer, [9]),
        RuleExpression::is_in(RuleKind::PurchasedProduct, [P4, P5]),
        RuleExpression::not_in(RuleKind::PurchasedProduct, [P2]),
        RuleExpression::is_in(RuleKind::ProductOnWishlist, [P6]),
        RuleExpression::not_in(RuleKind::ProductOnWishlist, [P7]),
        RuleExpression::is_in(RuleKind::ProductOnWishlist, [P5]),
    ];

    for expr in expressions {
        let set = RuleSet::and(vec![expr.clone().into()]);
        let from_pg = pg.is_match(&set, &ctx).await.unwrap();
        let from_memory = memory.is_match(&set, &ctx).await.unwrap();
        assert_eq!(from_pg, from_memory, "expression: {}", expr);
    }

    cleanup(&pool).await;
}
