//! # Repository Module
//!
//! Database repository implementations for Tillpoint.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Checkout orchestrator / read cache / seeding                          │
//! │       │                                                                 │
//! │       │  db.products().list(&filter)                                   │
//! │       ▼                                                                 │
//! │  ProductRepository              TransactionRepository                  │
//! │  ├── create / get_by_id         ├── create (validated)                 │
//! │  ├── list / count               ├── list / stats / search              │
//! │  ├── update / delete            ├── update / delete                    │
//! │  ├── stats / categories         ├── save_line_items (best effort)      │
//! │  └── bulk_import                └── product_analytics                  │
//! │       │                                                                 │
//! │       │  SQL + codec (JSON blob columns)                               │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog of record
//! - [`TransactionRepository`](transaction::TransactionRepository) - Sales,
//!   refunds, returns and their normalized line items

pub mod product;
pub mod transaction;

use sqlx::{QueryBuilder, Sqlite};

/// Appends `LIMIT`/`OFFSET`. An offset alone still needs `LIMIT -1` in SQLite.
pub(crate) fn push_pagination(qb: &mut QueryBuilder<'_, Sqlite>, limit: Option<i64>, offset: Option<i64>) {
    match (limit, offset) {
        (None, None) => {}
        (limit, offset) => {
            qb.push(" LIMIT ").push_bind(limit.unwrap_or(-1));
            if let Some(offset) = offset {
                qb.push(" OFFSET ").push_bind(offset);
            }
        }
    }
}

/// Escapes `%`, `_` and `\` so user text matches literally inside `LIKE`.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("latte"), "%latte%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
