//! # Product Read Cache
//!
//! Memoizes paginated product listings in front of [`ProductRepository`].
//!
//! ## Lookup Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ProductCache::get                                │
//! │                                                                         │
//! │  ProductQuery ──► cache_key() ──► "category=Coffee|page=2"             │
//! │                                        │                                │
//! │                     ┌──────────────────┴──────────────────┐            │
//! │                     ▼                                      ▼            │
//! │               entry < TTL                           missing/expired     │
//! │               (hit, cloned)                         (expired removed)   │
//! │                                                            │            │
//! │                                                            ▼            │
//! │                                          store.list + store.count       │
//! │                                                            │            │
//! │                                          evict if full, then insert     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invalidation
//! Every write made through the cache drops the entries that could now be
//! wrong: general listings, listings for the product's category or brand,
//! and any cached page that contains the product. `bulk_import` clears
//! everything.
//!
//! The cache never touches SQL itself; all reads go through the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tillpoint_core::{
    BestEffortReport, Money, NewProduct, Product, ProductFilter, ProductSort, ProductUpdate,
    SortDirection, SortField,
};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Number of category listings warmed by [`ProductCache::preload`].
const PRELOAD_CATEGORIES: usize = 2;

// =============================================================================
// Configuration & Query
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Page-based product query, as issued by the catalog screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub in_stock: Option<bool>,
    /// 1-based.
    pub page: i64,
    pub limit: i64,
    pub sort: ProductSort,
}

impl Default for ProductQuery {
    fn default() -> Self {
        ProductQuery {
            search: None,
            category: None,
            brand: None,
            min_price: None,
            max_price: None,
            in_stock: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: ProductSort::default(),
        }
    }
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = ProductSort::new(field, direction);
        self
    }

    /// Trimmed search text, as the store receives it.
    fn search_text(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn effective_page(&self) -> i64 {
        self.page.max(1)
    }

    fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    /// True when no filter narrows the listing (sort and paging aside).
    pub fn is_general(&self) -> bool {
        self.search_text().is_none()
            && self.category.is_none()
            && self.brand.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.in_stock.is_none()
    }

    /// Canonical key built from present, non-default parameters only.
    ///
    /// Parts always appear in the same order, so equivalent queries share a
    /// key and the unfiltered first page is `"all"`. Free-text values are
    /// escaped, so no value can spell out another parameter. Search text
    /// folds ASCII case only, matching SQLite `LIKE`.
    pub fn cache_key(&self) -> String {
        let mut parts = Vec::new();

        if let Some(search) = self.search_text() {
            parts.push(format!("q={}", escape_key_value(&search.to_ascii_lowercase())));
        }
        if let Some(category) = &self.category {
            parts.push(format!("category={}", escape_key_value(category)));
        }
        if let Some(brand) = &self.brand {
            parts.push(format!("brand={}", escape_key_value(brand)));
        }
        if let Some(min) = self.min_price {
            parts.push(format!("min={}", min.cents()));
        }
        if let Some(max) = self.max_price {
            parts.push(format!("max={}", max.cents()));
        }
        if let Some(in_stock) = self.in_stock {
            parts.push(format!("in_stock={in_stock}"));
        }
        if self.effective_page() != 1 {
            parts.push(format!("page={}", self.effective_page()));
        }
        if self.effective_limit() != DEFAULT_PAGE_SIZE {
            parts.push(format!("limit={}", self.effective_limit()));
        }
        if !self.sort.is_default() {
            parts.push(format!(
                "sort={}:{}",
                self.sort.field.as_str(),
                self.sort.direction.as_str()
            ));
        }

        if parts.is_empty() {
            "all".to_string()
        } else {
            parts.join("|")
        }
    }

    /// The store filter this query reads through to.
    pub fn to_filter(&self) -> ProductFilter {
        let limit = self.effective_limit();
        ProductFilter {
            search: self.search_text().map(str::to_string),
            category: self.category.clone(),
            brand: self.brand.clone(),
            in_stock: self.in_stock,
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
            limit: Some(limit),
            offset: Some((self.effective_page() - 1) * limit),
        }
    }
}

/// Percent-escapes the key's separators (and `%` itself).
fn escape_key_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '|' => out.push_str("%7C"),
            '=' => out.push_str("%3D"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

/// One page of products plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl ProductPage {
    pub fn contains(&self, product_id: &str) -> bool {
        self.products.iter().any(|p| p.id == product_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// =============================================================================
// Cache State
// =============================================================================

#[derive(Debug)]
struct CacheEntry {
    query: ProductQuery,
    page: ProductPage,
    created_at: Instant,
}

impl CacheEntry {
    fn is_stale_for(&self, product: &Product) -> bool {
        self.query.is_general()
            || self.query.category.as_deref() == Some(product.category.as_str())
            || (product.brand.is_some() && self.query.brand == product.brand)
            || self.page.contains(&product.id)
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn purge_expired(&mut self, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.created_at.elapsed() < ttl);
        let removed = before - self.entries.len();
        self.evictions += removed as u64;
        removed
    }

    /// Drops the oldest half of the entries.
    fn evict_oldest_half(&mut self) {
        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.created_at, k.clone()))
            .collect();
        by_age.sort();

        let count = by_age.len() / 2;
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        self.evictions += count as u64;
    }

    fn make_room(&mut self, config: &CacheConfig) {
        if self.entries.len() < config.max_entries {
            return;
        }
        let expired = self.purge_expired(config.ttl);
        if self.entries.len() > config.max_entries / 2 {
            self.evict_oldest_half();
        }
        debug!(expired, remaining = self.entries.len(), "Cache eviction pass");
    }
}

// =============================================================================
// Product Cache
// =============================================================================

/// TTL- and size-bounded cache over product listings.
///
/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone)]
pub struct ProductCache {
    store: ProductRepository,
    config: CacheConfig,
    inner: Arc<RwLock<CacheInner>>,
}

impl ProductCache {
    pub fn new(store: ProductRepository) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: ProductRepository, config: CacheConfig) -> Self {
        ProductCache {
            store,
            config,
            inner: Arc::new(RwLock::new(CacheInner::default())),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// The wrapped store, for reads the cache does not cover.
    pub fn store(&self) -> &ProductRepository {
        &self.store
    }

    /// Returns the page for `query`, from cache when fresh.
    pub async fn get(&self, query: &ProductQuery) -> DbResult<ProductPage> {
        let key = query.cache_key();

        if let Some(page) = self.lookup(&key).await {
            debug!(key = %key, "Product cache hit");
            return Ok(page);
        }

        debug!(key = %key, "Product cache miss");
        let filter = query.to_filter();
        let products = self.store.list(&filter).await?;
        let total = self.store.count(&filter).await?;

        let page = ProductPage {
            products,
            total,
            page: query.effective_page(),
            limit: query.effective_limit(),
        };

        let mut inner = self.inner.write().await;
        inner.make_room(&self.config);
        inner.entries.insert(
            key,
            CacheEntry {
                query: query.clone(),
                page: page.clone(),
                created_at: Instant::now(),
            },
        );

        Ok(page)
    }

    async fn lookup(&self, key: &str) -> Option<ProductPage> {
        let mut inner = self.inner.write().await;

        let fresh = match inner.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.config.ttl => {
                Some(entry.page.clone())
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.evictions += 1;
                None
            }
            None => None,
        };

        match fresh {
            Some(page) => {
                inner.hits += 1;
                Some(page)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Drops every entry that could reflect the old state of `product`.
    pub async fn invalidate_product(&self, product: &Product) {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_stale_for(product));
        let dropped = before - inner.entries.len();
        debug!(id = %product.id, dropped, "Invalidated product cache entries");
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        let dropped = inner.entries.len();
        inner.entries.clear();
        info!(dropped, "Product cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    // =========================================================================
    // Write-through
    // =========================================================================

    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        let product = self.store.create(input).await?;
        self.invalidate_product(&product).await;
        Ok(product)
    }

    /// Updates through the store, invalidating for both the old and new
    /// state so a category or brand move leaves nothing stale behind.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        let before = self.store.get_by_id(id).await?;
        let after = self.store.update(id, update).await?;
        self.invalidate_product(&before).await;
        self.invalidate_product(&after).await;
        Ok(after)
    }

    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        let product = self.store.adjust_stock(id, delta).await?;
        self.invalidate_product(&product).await;
        Ok(product)
    }

    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let existing = match self.store.get_by_id(id).await {
            Ok(product) => product,
            Err(DbError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let deleted = self.store.delete(id).await?;
        if deleted {
            self.invalidate_product(&existing).await;
        }
        Ok(deleted)
    }

    pub async fn bulk_import(&self, products: &[NewProduct]) -> DbResult<usize> {
        let count = self.store.bulk_import(products).await?;
        self.clear().await;
        Ok(count)
    }

    // =========================================================================
    // Preload
    // =========================================================================

    /// Warms the listings the catalog screen opens with.
    ///
    /// Runs through [`ProductCache::get`]; a failing query is logged and
    /// recorded while the rest still run.
    pub async fn preload(&self) -> BestEffortReport {
        let mut report = BestEffortReport::new();

        let mut queries = vec![
            ("default".to_string(), ProductQuery::new()),
            (
                "newest".to_string(),
                ProductQuery::new().sort(SortField::Created, SortDirection::Desc),
            ),
        ];

        match self.store.categories().await {
            Ok(categories) => {
                for entry in categories.into_iter().take(PRELOAD_CATEGORIES) {
                    queries.push((
                        format!("category {}", entry.category),
                        ProductQuery::new().category(entry.category),
                    ));
                }
            }
            Err(e) => {
                warn!(error = %e, "Preload could not list categories");
                report.record_failure("categories", e);
            }
        }

        queries.push(("in stock".to_string(), ProductQuery::new().in_stock(true)));

        for (label, query) in queries {
            match self.get(&query).await {
                Ok(_) => report.record_success(),
                Err(e) => {
                    warn!(query = %label, error = %e, "Preload query failed");
                    report.record_failure(label, e);
                }
            }
        }

        info!(
            warmed = report.succeeded,
            failed = report.failed(),
            "Product cache preloaded"
        );
        report
    }
}
