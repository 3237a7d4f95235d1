//! # Column Codec
//!
//! Encoding for the JSON blob columns. Every read and write path goes
//! through these functions, so a stored blob always decodes the way it was
//! written.
//!
//! | Column                                 | Rust type                       | NULL means        |
//! |----------------------------------------|---------------------------------|-------------------|
//! | `products.variants`                    | `Option<Vec<VariantGroup>>`     | no variants       |
//! | `transactions.items`                   | `Vec<TransactionItem>`          | (never NULL)      |
//! | `transactions.payment_methods`         | `Vec<PaymentMethod>`            | (never NULL)      |
//! | `transactions.receipt_options`         | `Option<ReceiptOptions>`        | none chosen       |
//! | `transactions.metrics`                 | `Option<serde_json::Value>`     | no metrics        |
//! | `transaction_line_items.selected_variants` | `BTreeMap<String, String>`  | no selections     |

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tillpoint_core::{PaymentMethod, ReceiptOptions, TransactionItem, VariantGroup};

use crate::error::{DbError, DbResult};

pub fn encode_json<T: Serialize + ?Sized>(column: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::serialization(column, e))
}

pub fn decode_json<T: DeserializeOwned>(column: &str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw).map_err(|e| DbError::serialization(column, e))
}

fn encode_optional<T: Serialize>(column: &str, value: Option<&T>) -> DbResult<Option<String>> {
    value.map(|v| encode_json(column, v)).transpose()
}

/// NULL and blank strings both decode to `None`.
fn decode_optional<T: DeserializeOwned>(column: &str, raw: Option<&str>) -> DbResult<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => decode_json(column, raw).map(Some),
    }
}

// =============================================================================
// Products
// =============================================================================

pub fn encode_variants(variants: Option<&Vec<VariantGroup>>) -> DbResult<Option<String>> {
    encode_optional("variants", variants)
}

pub fn decode_variants(raw: Option<&str>) -> DbResult<Option<Vec<VariantGroup>>> {
    decode_optional("variants", raw)
}

// =============================================================================
// Transactions
// =============================================================================

pub fn encode_items(items: &[TransactionItem]) -> DbResult<String> {
    encode_json("items", items)
}

pub fn decode_items(raw: &str) -> DbResult<Vec<TransactionItem>> {
    decode_json("items", raw)
}

pub fn encode_payments(payments: &[PaymentMethod]) -> DbResult<String> {
    encode_json("payment_methods", payments)
}

pub fn decode_payments(raw: &str) -> DbResult<Vec<PaymentMethod>> {
    decode_json("payment_methods", raw)
}

pub fn encode_receipt_options(options: Option<&ReceiptOptions>) -> DbResult<Option<String>> {
    encode_optional("receipt_options", options)
}

pub fn decode_receipt_options(raw: Option<&str>) -> DbResult<Option<ReceiptOptions>> {
    decode_optional("receipt_options", raw)
}

pub fn encode_metrics(metrics: Option<&serde_json::Value>) -> DbResult<Option<String>> {
    encode_optional("metrics", metrics)
}

pub fn decode_metrics(raw: Option<&str>) -> DbResult<Option<serde_json::Value>> {
    decode_optional("metrics", raw)
}

// =============================================================================
// Line Items
// =============================================================================

/// An empty selection is stored as NULL.
pub fn encode_selected_variants(selected: &BTreeMap<String, String>) -> DbResult<Option<String>> {
    if selected.is_empty() {
        return Ok(None);
    }
    encode_json("selected_variants", selected).map(Some)
}

pub fn decode_selected_variants(raw: Option<&str>) -> DbResult<BTreeMap<String, String>> {
    Ok(decode_optional("selected_variants", raw)?.unwrap_or_default())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;
    use tillpoint_core::{Money, PaymentKind, ReceiptDelivery, VariantOption};

    fn money() -> impl Strategy<Value = Money> {
        (0i64..10_000_000).prop_map(Money::from_cents)
    }

    fn variant_group() -> impl Strategy<Value = VariantGroup> {
        (
            "[a-z]{1,8}",
            vec(("[A-Za-z ]{1,12}", money()), 0..4),
        )
            .prop_map(|(kind, options)| VariantGroup {
                kind,
                options: options
                    .into_iter()
                    .map(|(name, price)| VariantOption { name, price })
                    .collect(),
            })
    }

    fn item() -> impl Strategy<Value = TransactionItem> {
        (
            "[A-Z0-9-]{1,10}",
            "\\PC{1,20}",
            money(),
            money(),
            1i64..999,
            btree_map("[a-z]{1,6}", "[A-Za-z]{1,6}", 0..3),
            proptest::option::of("\\PC{0,30}"),
        )
            .prop_map(|(id, name, unit, delta, qty, selected, note)| {
                let mut item = TransactionItem::new(id, name, unit, delta, qty).with_variants(selected);
                item.note = note;
                item
            })
    }

    fn payment() -> impl Strategy<Value = PaymentMethod> {
        (
            prop_oneof![
                Just(PaymentKind::Cash),
                Just(PaymentKind::Card),
                Just(PaymentKind::Mobile),
                Just(PaymentKind::Link),
                Just(PaymentKind::Account),
                Just(PaymentKind::Split),
            ],
            1i64..10_000_000,
            proptest::option::of("[A-Z0-9]{4,12}"),
        )
            .prop_map(|(kind, cents, reference)| {
                let mut p = PaymentMethod::new(kind, Money::from_cents(cents));
                p.reference = reference;
                p
            })
    }

    fn receipt_options() -> impl Strategy<Value = ReceiptOptions> {
        (
            prop_oneof![
                Just(ReceiptDelivery::Print),
                Just(ReceiptDelivery::Sms),
                Just(ReceiptDelivery::Email),
                Just(ReceiptDelivery::None),
            ],
            proptest::option::of("\\PC{0,24}"),
        )
            .prop_map(|(delivery, contact)| ReceiptOptions { delivery, contact })
    }

    /// JSON without floats; serde_json only round-trips integers exactly.
    fn metrics() -> impl Strategy<Value = serde_json::Value> {
        use serde_json::Value;

        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "\\PC{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                vec(inner.clone(), 0..4).prop_map(Value::Array),
                btree_map("[a-zA-Z]{1,10}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_receipt_options_round_trip(options in proptest::option::of(receipt_options())) {
            let encoded = encode_receipt_options(options.as_ref()).unwrap();
            prop_assert_eq!(encoded.is_none(), options.is_none());
            prop_assert_eq!(decode_receipt_options(encoded.as_deref()).unwrap(), options);
        }

        #[test]
        fn prop_metrics_round_trip(value in proptest::option::of(metrics())) {
            let encoded = encode_metrics(value.as_ref()).unwrap();
            prop_assert_eq!(encoded.is_none(), value.is_none());
            prop_assert_eq!(decode_metrics(encoded.as_deref()).unwrap(), value);
        }

        #[test]
        fn prop_variants_round_trip(variants in proptest::option::of(vec(variant_group(), 0..4))) {
            let encoded = encode_variants(variants.as_ref()).unwrap();
            prop_assert_eq!(encoded.is_none(), variants.is_none());
            prop_assert_eq!(decode_variants(encoded.as_deref()).unwrap(), variants);
        }

        #[test]
        fn prop_items_round_trip(items in vec(item(), 1..6)) {
            let encoded = encode_items(&items).unwrap();
            prop_assert_eq!(decode_items(&encoded).unwrap(), items);
        }

        #[test]
        fn prop_payments_round_trip(payments in vec(payment(), 1..4)) {
            let encoded = encode_payments(&payments).unwrap();
            prop_assert_eq!(decode_payments(&encoded).unwrap(), payments);
        }

        #[test]
        fn prop_selected_variants_round_trip(selected in btree_map("[a-z]{1,6}", "[A-Za-z]{1,6}", 0..4)) {
            let encoded = encode_selected_variants(&selected).unwrap();
            prop_assert_eq!(encoded.is_none(), selected.is_empty());
            prop_assert_eq!(decode_selected_variants(encoded.as_deref()).unwrap(), selected);
        }
    }

    #[test]
    fn test_receipt_options_round_trip() {
        for options in [
            None,
            Some(ReceiptOptions::print()),
            Some(ReceiptOptions::email("a@b.co")),
            Some(ReceiptOptions {
                delivery: ReceiptDelivery::None,
                contact: None,
            }),
        ] {
            let encoded = encode_receipt_options(options.as_ref()).unwrap();
            assert_eq!(decode_receipt_options(encoded.as_deref()).unwrap(), options);
        }
    }

    #[test]
    fn test_metrics_absent_and_present() {
        assert_eq!(encode_metrics(None).unwrap(), None);
        let value = serde_json::json!({"durationMs": 4200, "screen": "checkout"});
        let encoded = encode_metrics(Some(&value)).unwrap();
        assert_eq!(decode_metrics(encoded.as_deref()).unwrap(), Some(value));
    }

    #[test]
    fn test_blank_blob_reads_as_absent() {
        assert_eq!(decode_variants(Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_corrupt_blob_is_serialization_error() {
        let err = decode_items("{not json").unwrap_err();
        assert!(matches!(err, DbError::Serialization { ref column, .. } if column == "items"));
    }
}
