//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Key Operations
//! - CRUD with typed partial updates
//! - Filtered, sorted, paginated listing (shared filter SQL for `count`)
//! - Aggregate statistics computed in SQL
//! - Idempotent bulk import (upsert by id)
//!
//! ## Stock Flag
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  in_stock is written in the SAME statement as stock_quantity:          │
//! │                                                                         │
//! │    create        → in_stock = stock_quantity > 0                       │
//! │    update        → SET stock_quantity = ?, in_stock = ?                │
//! │    adjust_stock  → both computed from MAX(0, stock_quantity + delta)   │
//! │    bulk_import   → in_stock = excluded.in_stock                        │
//! │                                                                         │
//! │  No write path can leave the two columns disagreeing.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tillpoint_core::validation::validate_new_product;
use tillpoint_core::{
    CategoryCount, Money, NewProduct, Product, ProductChange, ProductFilter, ProductSort,
    ProductStats, ProductUpdate, SortDirection, SortField,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{like_pattern, push_pagination};
use crate::codec;
use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = "id, name, category, price, image, description, badge, variants, \
     in_stock, stock_quantity, barcode, qr_code, reorder_quantity, min_buy_quantity, \
     max_buy_quantity, reseller, brand, notes, created_at, updated_at";

const INSERT_PRODUCT: &str = r#"
INSERT INTO products (
    id, name, category, price, image, description, badge, variants,
    in_stock, stock_quantity, barcode, qr_code, reorder_quantity, min_buy_quantity,
    max_buy_quantity, reseller, brand, notes, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_SUFFIX: &str = r#"
ON CONFLICT (id) DO UPDATE SET
    name = excluded.name,
    category = excluded.category,
    price = excluded.price,
    image = excluded.image,
    description = excluded.description,
    badge = excluded.badge,
    variants = excluded.variants,
    in_stock = excluded.in_stock,
    stock_quantity = excluded.stock_quantity,
    barcode = excluded.barcode,
    qr_code = excluded.qr_code,
    reorder_quantity = excluded.reorder_quantity,
    min_buy_quantity = excluded.min_buy_quantity,
    max_buy_quantity = excluded.max_buy_quantity,
    reseller = excluded.reseller,
    brand = excluded.brand,
    notes = excluded.notes,
    updated_at = excluded.updated_at
"#;

const STATS_SQL: &str = r#"
SELECT
    COUNT(*),
    COALESCE(SUM(price * stock_quantity), 0),
    COALESCE(AVG(price), 0.0),
    COALESCE(SUM(CASE WHEN in_stock = 1 THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN in_stock = 0 THEN 1 ELSE 0 END), 0),
    COUNT(DISTINCT category)
FROM products
"#;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: String,
    price: i64,
    image: Option<String>,
    description: Option<String>,
    badge: Option<String>,
    variants: Option<String>,
    in_stock: bool,
    stock_quantity: i64,
    barcode: Option<String>,
    qr_code: Option<String>,
    reorder_quantity: Option<i64>,
    min_buy_quantity: Option<i64>,
    max_buy_quantity: Option<i64>,
    reseller: Option<String>,
    brand: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        Ok(Product {
            variants: codec::decode_variants(row.variants.as_deref())?,
            id: row.id,
            name: row.name,
            category: row.category,
            price: Money::from_cents(row.price),
            image: row.image,
            description: row.description,
            badge: row.badge,
            in_stock: row.in_stock,
            stock_quantity: row.stock_quantity,
            barcode: row.barcode,
            qr_code: row.qr_code,
            reorder_quantity: row.reorder_quantity,
            min_buy_quantity: row.min_buy_quantity,
            max_buy_quantity: row.max_buy_quantity,
            reseller: row.reseller,
            brand: row.brand,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn bind_new_product<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    id: &'q str,
    product: &'q NewProduct,
    variants: Option<String>,
    now: DateTime<Utc>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(id)
        .bind(product.name.trim())
        .bind(product.category.trim())
        .bind(product.price.cents())
        .bind(product.image.as_deref())
        .bind(product.description.as_deref())
        .bind(product.badge.as_deref())
        .bind(variants)
        .bind(product.stock_quantity > 0)
        .bind(product.stock_quantity)
        .bind(product.barcode.as_deref())
        .bind(product.qr_code.as_deref())
        .bind(product.reorder_quantity)
        .bind(product.min_buy_quantity)
        .bind(product.max_buy_quantity)
        .bind(product.reseller.as_deref())
        .bind(product.brand.as_deref())
        .bind(product.notes.as_deref())
        .bind(now)
        .bind(now)
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR category LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(brand) = &filter.brand {
        qb.push(" AND brand = ").push_bind(brand.clone());
    }
    if let Some(in_stock) = filter.in_stock {
        qb.push(" AND in_stock = ").push_bind(in_stock);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min.cents());
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max.cents());
    }
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: ProductSort) {
    let column = match sort.field {
        SortField::Name => "name COLLATE NOCASE",
        SortField::Price => "price",
        SortField::Created => "created_at",
        SortField::Stock => "stock_quantity",
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    // id breaks ties so pages never overlap
    qb.push(format!(" ORDER BY {column} {direction}, id ASC"));
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let created = repo.create(&NewProduct::new("Latte", "Coffee", Money::from_cents(450))).await?;
/// let coffee = repo.list(&ProductFilter { category: Some("Coffee".into()), ..Default::default() }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product, generating an id when the input has none.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored row, read back through the decode path
    /// * `Err(DbError::Validation)` - Bad name, category, price or stock
    /// * `Err(DbError::UniqueViolation)` - The id already exists
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;

        let id = input.id.clone().unwrap_or_else(generate_product_id);
        debug!(id = %id, name = %input.name, "Creating product");

        let variants = codec::encode_variants(input.variants.as_ref())?;
        bind_new_product(sqlx::query(INSERT_PRODUCT), &id, input, variants, Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("product id", &id),
                other => other,
            })?;

        self.get_by_id(&id).await
    }

    /// Gets a product by id, or `DbError::NotFound`.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Product> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| DbError::not_found("Product", id))?
            .try_into()
    }

    /// Finds a product by barcode (scanner lookup).
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ? LIMIT 1"
        ))
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists products matching `filter`.
    ///
    /// Search is a case-insensitive substring match over name, description
    /// and category; the other filters are exact and conjunctive. Default
    /// order is name ascending.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        debug!(?filter, "Listing products");

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filters(&mut qb, filter);
        push_order(&mut qb, filter.sort);
        push_pagination(&mut qb, filter.limit, filter.offset);

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Counts products matching `filter`, ignoring sort and pagination.
    pub async fn count(&self, filter: &ProductFilter) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Counts every product (warm-up and seeding checks).
    pub async fn count_all(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Applies a typed partial update and returns the new row.
    ///
    /// `updated_at` is always restamped. A stock change rewrites `in_stock`
    /// in the same statement.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        update.validate()?;
        debug!(id, changes = update.changes().len(), "Updating product");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        {
            let mut set = qb.separated(", ");
            for change in update.changes() {
                set.push(format!("{} = ", change.column()));
                match change {
                    ProductChange::Name(v) | ProductChange::Category(v) => {
                        set.push_bind_unseparated(v.trim().to_string());
                    }
                    ProductChange::Price(v) => {
                        set.push_bind_unseparated(v.cents());
                    }
                    ProductChange::Variants(v) => {
                        set.push_bind_unseparated(codec::encode_variants(v.as_ref())?);
                    }
                    ProductChange::StockQuantity(v) => {
                        set.push_bind_unseparated(*v);
                        set.push("in_stock = ");
                        set.push_bind_unseparated(*v > 0);
                    }
                    ProductChange::Image(v)
                    | ProductChange::Description(v)
                    | ProductChange::Badge(v)
                    | ProductChange::Barcode(v)
                    | ProductChange::QrCode(v)
                    | ProductChange::Reseller(v)
                    | ProductChange::Brand(v)
                    | ProductChange::Notes(v) => {
                        set.push_bind_unseparated(v.clone());
                    }
                    ProductChange::ReorderQuantity(v)
                    | ProductChange::MinBuyQuantity(v)
                    | ProductChange::MaxBuyQuantity(v) => {
                        set.push_bind_unseparated(*v);
                    }
                }
            }
            set.push("updated_at = ");
            set.push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id).await
    }

    /// Adds `delta` to the stock level, clamping at zero.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id, delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                stock_quantity = MAX(0, stock_quantity + ?1),
                in_stock = MAX(0, stock_quantity + ?1) > 0,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id).await
    }

    /// Hard-deletes a product. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        debug!(id, "Deleting product");
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Catalog statistics in a single aggregate query.
    pub async fn stats(&self) -> DbResult<ProductStats> {
        let (total_products, total_value, average_price, in_stock, out_of_stock, categories): (
            i64,
            i64,
            f64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(STATS_SQL).fetch_one(&self.pool).await?;

        Ok(ProductStats {
            total_products,
            total_value: Money::from_cents(total_value),
            average_price: Money::from_average(average_price),
            in_stock,
            out_of_stock,
            categories,
        })
    }

    /// Distinct categories with product counts, ordered by name.
    pub async fn categories(&self) -> DbResult<Vec<CategoryCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM products GROUP BY category ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    /// Upserts products by id inside one SQL transaction.
    ///
    /// Every input is validated first, so a bad record imports nothing.
    /// Re-importing the same ids replaces those rows (keeping `created_at`).
    pub async fn bulk_import(&self, products: &[NewProduct]) -> DbResult<usize> {
        for product in products {
            validate_new_product(product)?;
        }

        let sql = format!("{INSERT_PRODUCT}{UPSERT_SUFFIX}");
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for product in products {
            let id = product.id.clone().unwrap_or_else(generate_product_id);
            let variants = codec::encode_variants(product.variants.as_ref())?;
            bind_new_product(sqlx::query(&sql), &id, product, variants, now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(count = products.len(), "Bulk import complete");
        Ok(products.len())
    }
}

/// Generates a new opaque product id.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
