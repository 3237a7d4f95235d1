//! # Catalog Seeding
//!
//! Loads a static product list into an empty (or forced) catalog.
//!
//! Seeding is idempotent by id: records without an id get a stable slug
//! derived from category and name, and the write is a bulk upsert, so
//! re-running with `force` replaces rows instead of duplicating them.
//!
//! Two derived slugs that collide ("Latte (S)" and "Latte S") are told
//! apart by a hash of the raw name. Two records with the same explicit id
//! are refused before anything is written.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tillpoint_core::{Money, NewProduct, VariantGroup, VariantOption};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;

/// Demo stock levels drawn when a record has none.
pub const DEMO_STOCK_RANGE: std::ops::RangeInclusive<i64> = 10..=100;

/// One record of the seed data contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub variants: Option<Vec<VariantGroup>>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
}

impl SeedProduct {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: Money) -> Self {
        SeedProduct {
            id: None,
            name: name.into(),
            category: category.into(),
            price,
            image: None,
            description: None,
            badge: None,
            variants: None,
            stock_quantity: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn with_variants(mut self, variants: Vec<VariantGroup>) -> Self {
        self.variants = Some(variants);
        self
    }

    /// The id this record is stored under when nothing else in the batch
    /// claims it.
    pub fn seed_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.derived_id())
    }

    fn derived_id(&self) -> String {
        let category = slug(&self.category);
        let name = slug(&self.name);
        if name.is_empty() {
            format!("{}-{:08x}", category, name_hash(&self.name))
        } else {
            format!("{}-{}", category, name)
        }
    }
}

/// Lowercase slug: letters and digits (any script) kept, everything else
/// collapses to `-`.
fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// 32-bit FNV-1a of the trimmed name. Stable across runs and toolchains.
fn name_hash(name: &str) -> u32 {
    name.trim().bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Final ids for a batch, in input order.
///
/// Derived ids that collide get a name-hash suffix. Explicit ids are never
/// rewritten, so a clash involving one is an error.
fn assign_ids(products: &[SeedProduct]) -> DbResult<Vec<String>> {
    let explicit: HashSet<&str> = products.iter().filter_map(|p| p.id.as_deref()).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(products.len());
    let mut ids = Vec::with_capacity(products.len());

    for seed in products {
        let id = match &seed.id {
            Some(id) => id.clone(),
            None => {
                let base = seed.derived_id();
                if taken.contains(&base) || explicit.contains(base.as_str()) {
                    format!("{}-{:08x}", base, name_hash(&seed.name))
                } else {
                    base
                }
            }
        };
        if !taken.insert(id.clone()) {
            return Err(DbError::UniqueViolation {
                field: "id".to_string(),
                value: id,
            });
        }
        ids.push(id);
    }
    Ok(ids)
}

fn to_new_products(products: &[SeedProduct]) -> DbResult<Vec<NewProduct>> {
    let ids = assign_ids(products)?;
    let mut rng = rand::thread_rng();
    Ok(products
        .iter()
        .zip(ids)
        .map(|(seed, id)| {
            let stock = seed
                .stock_quantity
                .unwrap_or_else(|| rng.gen_range(DEMO_STOCK_RANGE));
            let mut product = NewProduct::new(seed.name.clone(), seed.category.clone(), seed.price)
                .with_id(id)
                .with_stock(stock);
            product.image = seed.image.clone();
            product.description = seed.description.clone();
            product.badge = seed.badge.clone();
            product.variants = seed.variants.clone();
            product
        })
        .collect())
}

/// Seeds the catalog.
///
/// ## Returns
/// * `Ok(0)` - The catalog already had products and `force` was off
/// * `Ok(n)` - `n` records were upserted, one row each
/// * `Err(UniqueViolation)` - two records share an explicit id; nothing written
pub async fn seed_catalog(
    store: &ProductRepository,
    products: &[SeedProduct],
    force: bool,
) -> DbResult<usize> {
    let existing = store.count_all().await?;
    if existing > 0 && !force {
        info!(existing, "Catalog already populated, skipping seed");
        return Ok(0);
    }

    let records = to_new_products(products)?;
    let count = store.bulk_import(&records).await?;
    info!(count, force, "Catalog seeded");
    Ok(count)
}

fn sizes(small: i64, medium: i64, large: i64) -> VariantGroup {
    VariantGroup {
        kind: "size".to_string(),
        options: vec![
            VariantOption {
                name: "Small".to_string(),
                price: Money::from_cents(small),
            },
            VariantOption {
                name: "Medium".to_string(),
                price: Money::from_cents(medium),
            },
            VariantOption {
                name: "Large".to_string(),
                price: Money::from_cents(large),
            },
        ],
    }
}

fn milks() -> VariantGroup {
    VariantGroup {
        kind: "milk".to_string(),
        options: [("Whole", 0), ("Oat", 60), ("Almond", 60)]
            .into_iter()
            .map(|(name, cents)| VariantOption {
                name: name.to_string(),
                price: Money::from_cents(cents),
            })
            .collect(),
    }
}

/// Built-in demo catalog for a small café.
pub fn default_catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct::new("Espresso", "Coffee", Money::from_cents(300))
            .with_description("Double shot, house blend")
            .with_variants(vec![sizes(0, 50, 100)]),
        SeedProduct::new("Cappuccino", "Coffee", Money::from_cents(450))
            .with_badge("Popular")
            .with_variants(vec![sizes(0, 50, 100), milks()]),
        SeedProduct::new("Latte", "Coffee", Money::from_cents(475))
            .with_variants(vec![sizes(0, 50, 100), milks()]),
        SeedProduct::new("Flat White", "Coffee", Money::from_cents(425))
            .with_variants(vec![milks()]),
        SeedProduct::new("Cold Brew", "Coffee", Money::from_cents(500))
            .with_description("Steeped 18 hours")
            .with_variants(vec![sizes(0, 75, 150)]),
        SeedProduct::new("Green Tea", "Tea", Money::from_cents(325)),
        SeedProduct::new("Chai Latte", "Tea", Money::from_cents(450))
            .with_variants(vec![milks()]),
        SeedProduct::new("Butter Croissant", "Bakery", Money::from_cents(350))
            .with_badge("Fresh"),
        SeedProduct::new("Blueberry Muffin", "Bakery", Money::from_cents(375)),
        SeedProduct::new("Cinnamon Roll", "Bakery", Money::from_cents(425)),
        SeedProduct::new("Turkey Sandwich", "Food", Money::from_cents(895))
            .with_description("Turkey, swiss, greens on sourdough"),
        SeedProduct::new("Avocado Toast", "Food", Money::from_cents(995))
            .with_badge("New"),
    ]
}
