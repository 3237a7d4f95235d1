//! Read cache behaviour: hits, expiry, capacity and invalidation.

mod common;

use std::time::Duration;

use common::{product, seed_products, test_db};
use tillpoint_core::{Money, ProductUpdate};
use tillpoint_db::{CacheConfig, ProductCache, ProductQuery};

fn with_ttl(db: &tillpoint_db::Database, ttl: Duration, max_entries: usize) -> ProductCache {
    ProductCache::with_config(db.products(), CacheConfig { ttl, max_entries })
}

#[tokio::test]
async fn cached_page_matches_store() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("C1", "Latte", "Coffee", 475, 5),
            product("C2", "Mocha", "Coffee", 500, 0),
            product("B1", "Muffin", "Bakery", 375, 3),
        ],
    )
    .await;
    let cache = ProductCache::new(db.products());
    let query = ProductQuery::new().category("Coffee").limit(1);

    let first = cache.get(&query).await.unwrap();
    let second = cache.get(&query).await.unwrap();
    assert_eq!(first, second);

    let direct = db.products().list(&query.to_filter()).await.unwrap();
    assert_eq!(first.products, direct);
    assert_eq!(first.total, 2);
    assert_eq!(first.products.len(), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn non_ascii_search_matches_store() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("C1", "CAFÉ LATTE", "Coffee", 475, 5),
            product("C2", "café crème", "Coffee", 450, 5),
        ],
    )
    .await;
    let cache = ProductCache::new(db.products());

    for text in ["CAFÉ", "café", "Café", "LATTE"] {
        let query = ProductQuery::new().search(text);
        let direct = db.products().list(&query.to_filter()).await.unwrap();
        let cached = cache.get(&query).await.unwrap();
        assert_eq!(cached.products, direct, "search {text:?}");
        assert_eq!(cached.total, direct.len() as i64, "search {text:?}");
    }
}

#[tokio::test]
async fn look_alike_filters_do_not_share_a_page() {
    let db = test_db().await;
    let tea = product("T1", "Sencha", "a|brand=b", 300, 5);
    let mut scone = product("B1", "Scone", "a", 250, 5);
    scone.brand = Some("b".to_string());
    seed_products(&db, &[tea, scone]).await;
    let cache = ProductCache::new(db.products());

    let odd_category = cache
        .get(&ProductQuery::new().category("a|brand=b"))
        .await
        .unwrap();
    let category_and_brand = cache
        .get(&ProductQuery::new().category("a").brand("b"))
        .await
        .unwrap();

    assert_eq!(odd_category.products[0].id, "T1");
    assert_eq!(category_and_brand.products[0].id, "B1");
    assert_eq!(cache.stats().await.entries, 2);
}

#[tokio::test]
async fn expired_entries_are_refetched() {
    let db = test_db().await;
    seed_products(&db, &[product("C1", "Latte", "Coffee", 475, 5)]).await;
    let cache = with_ttl(&db, Duration::from_millis(100), 100);

    assert_eq!(cache.get(&ProductQuery::new()).await.unwrap().total, 1);

    // Written behind the cache's back: only expiry can reveal it.
    db.products()
        .create(&product("C2", "Mocha", "Coffee", 500, 5))
        .await
        .unwrap();
    assert_eq!(cache.get(&ProductQuery::new()).await.unwrap().total, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get(&ProductQuery::new()).await.unwrap().total, 2);

    let stats = cache.stats().await;
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn category_move_invalidates_old_and_new_listings() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("C1", "Latte", "Coffee", 475, 5),
            product("C2", "Mocha", "Coffee", 500, 5),
        ],
    )
    .await;
    let cache = ProductCache::new(db.products());
    let coffee = ProductQuery::new().category("Coffee");
    let tea = ProductQuery::new().category("Tea");

    assert_eq!(cache.get(&coffee).await.unwrap().total, 2);
    assert_eq!(cache.get(&tea).await.unwrap().total, 0);

    cache
        .update("C1", &ProductUpdate::new().category("Tea"))
        .await
        .unwrap();

    let coffee_page = cache.get(&coffee).await.unwrap();
    assert!(!coffee_page.contains("C1"));
    assert_eq!(coffee_page.total, 1);
    assert!(cache.get(&tea).await.unwrap().contains("C1"));
    assert_eq!(cache.stats().await.hits, 0);
}

#[tokio::test]
async fn pages_containing_the_product_are_dropped() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("C1", "Latte", "Coffee", 475, 5),
            product("B1", "Muffin", "Bakery", 375, 3),
        ],
    )
    .await;
    let cache = ProductCache::new(db.products());
    let search = ProductQuery::new().search("lat");
    let bakery = ProductQuery::new().category("Bakery");

    cache.get(&search).await.unwrap();
    cache.get(&bakery).await.unwrap();

    let updated = cache
        .update("C1", &ProductUpdate::new().price(Money::from_cents(495)))
        .await
        .unwrap();
    assert_eq!(cache.stats().await.entries, 1);

    let page = cache.get(&search).await.unwrap();
    assert_eq!(page.products[0], updated);

    cache.get(&bakery).await.unwrap();
    assert_eq!(cache.stats().await.hits, 1);
}

#[tokio::test]
async fn brand_listings_are_invalidated() {
    let db = test_db().await;
    seed_products(&db, &[product("C1", "Latte", "Coffee", 475, 5).with_brand("House")]).await;
    let cache = ProductCache::new(db.products());
    let house = ProductQuery::new().brand("House");

    cache.get(&house).await.unwrap();
    cache
        .create(&product("C2", "Mocha", "Coffee", 500, 5).with_brand("House"))
        .await
        .unwrap();

    assert_eq!(cache.get(&house).await.unwrap().total, 2);
}

#[tokio::test]
async fn stock_changes_invalidate_in_stock_listing() {
    let db = test_db().await;
    seed_products(&db, &[product("C1", "Latte", "Coffee", 475, 1)]).await;
    let cache = ProductCache::new(db.products());
    let in_stock = ProductQuery::new().in_stock(true);

    assert_eq!(cache.get(&in_stock).await.unwrap().total, 1);
    cache.adjust_stock("C1", -1).await.unwrap();
    assert_eq!(cache.get(&in_stock).await.unwrap().total, 0);
}

#[tokio::test]
async fn full_cache_evicts_oldest_half() {
    let db = test_db().await;
    seed_products(&db, &[product("C1", "Latte", "Coffee", 475, 1)]).await;
    let cache = with_ttl(&db, Duration::from_secs(300), 4);

    for page in 1..=4 {
        cache.get(&ProductQuery::new().page(page)).await.unwrap();
    }
    assert_eq!(cache.stats().await.entries, 4);

    cache.get(&ProductQuery::new().page(5)).await.unwrap();
    let stats = cache.stats().await;
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.entries, 3);
}

#[tokio::test]
async fn bulk_import_and_clear_empty_the_cache() {
    let db = test_db().await;
    let cache = ProductCache::new(db.products());

    cache.get(&ProductQuery::new()).await.unwrap();
    cache.get(&ProductQuery::new().category("Coffee")).await.unwrap();
    assert_eq!(cache.stats().await.entries, 2);

    cache
        .bulk_import(&[product("C1", "Latte", "Coffee", 475, 5)])
        .await
        .unwrap();
    assert_eq!(cache.stats().await.entries, 0);
    assert_eq!(cache.get(&ProductQuery::new()).await.unwrap().total, 1);

    cache.clear().await;
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn delete_through_cache() {
    let db = test_db().await;
    seed_products(&db, &[product("C1", "Latte", "Coffee", 475, 5)]).await;
    let cache = ProductCache::new(db.products());

    cache.get(&ProductQuery::new()).await.unwrap();
    assert!(!cache.delete("missing").await.unwrap());
    assert_eq!(cache.stats().await.entries, 1);

    assert!(cache.delete("C1").await.unwrap());
    assert_eq!(cache.get(&ProductQuery::new()).await.unwrap().total, 0);
}

#[tokio::test]
async fn preload_warms_common_listings() {
    let db = test_db().await;
    seed_products(
        &db,
        &[
            product("B1", "Muffin", "Bakery", 375, 3),
            product("C1", "Latte", "Coffee", 475, 5),
            product("T1", "Chai", "Tea", 450, 0),
        ],
    )
    .await;
    let cache = ProductCache::new(db.products());

    let report = cache.preload().await;
    assert!(report.is_complete());
    assert_eq!(report.attempted, 5);
    assert_eq!(cache.stats().await.entries, 5);

    cache.get(&ProductQuery::new().category("Bakery")).await.unwrap();
    cache.get(&ProductQuery::new()).await.unwrap();
    assert_eq!(cache.stats().await.hits, 2);
}

#[tokio::test]
async fn preload_tolerates_failures() {
    let db = test_db().await;
    let cache = ProductCache::new(db.products());
    db.close().await;

    let report = cache.preload().await;
    assert_eq!(report.attempted, 4);
    assert_eq!(report.failed(), 4);
    assert_eq!(cache.stats().await.entries, 0);
}
