//! Line-item model and catalog validator.
//!
//! Raw catalog payloads arrive as untyped JSON records. The validator turns
//! them into [`LineItem`]s with strict field checking, assigns content-derived
//! ids where absent, and partitions the batch into valid items and rejected
//! records. Per-record failures never abort the batch; the caller gets both
//! halves back. Only a batch with no surviving record at all is fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{CatalogError, Result};
use crate::identity::ItemId;

/// A single catalog line item.
///
/// `Category`, `Selector`, and `Description` carry the item's identity;
/// everything else is pricing and UI metadata. Unknown fields are rejected
/// on input, and null or empty fields are pruned on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineItem {
    /// Category code.
    #[serde(rename = "Category")]
    pub category: String,
    /// Selector code within the category.
    #[serde(rename = "Selector")]
    pub selector: String,
    /// Human-readable description.
    #[serde(rename = "Description")]
    pub description: String,
    /// Activity code.
    #[serde(rename = "Activity", default, skip_serializing_if = "String::is_empty")]
    pub activity: String,
    /// Unit of measure.
    #[serde(rename = "Unit", default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
    /// Display name of the category.
    #[serde(
        rename = "CategoryName",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub category_name: String,
    /// Content-derived identity; assigned by the validator when absent.
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Price per unit.
    #[serde(rename = "UnitPrice", default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    /// Quantity of units.
    #[serde(rename = "Quantity", default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    /// Line subtotal.
    #[serde(rename = "Subtotal", default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    /// Line total.
    #[serde(rename = "Total", default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Tax amount.
    #[serde(rename = "Tax", default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    /// Free-form note.
    #[serde(rename = "Note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// UI selection flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    /// UI sub-damage selection flag.
    #[serde(
        rename = "subDamageSelected",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_damage_selected: Option<bool>,
    /// UI column ordering.
    #[serde(rename = "columnOrder", default, skip_serializing_if = "Vec::is_empty")]
    pub column_order: Vec<Value>,
    /// Free-form filter tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Value>,
    /// UI filter ordering.
    #[serde(rename = "filtersOrder", default, skip_serializing_if = "Vec::is_empty")]
    pub filters_order: Vec<Value>,
}

impl LineItem {
    /// Assigns the content-derived id when none was supplied.
    pub fn ensure_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(ItemId::derive(
                &self.category,
                &self.selector,
                &self.description,
            ));
        }
    }
}

/// A rejected record paired with the reason it failed validation.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidLineItem {
    /// The original record as received.
    pub record: Value,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Result of validating a raw line-item batch.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Items that passed validation, ids assigned, duplicates dropped.
    pub valid: Vec<LineItem>,
    /// Records that failed, each with its diagnostic.
    pub invalid: Vec<InvalidLineItem>,
}

/// Validates a raw batch, keeping what it can.
///
/// Each record is strictly validated; failures are collected, not raised.
/// Valid items get their id assigned when absent, and within the batch a
/// repeated id keeps only its first occurrence.
///
/// # Errors
///
/// Returns `CatalogError::Validation` only when no record survives, which
/// includes an empty input batch.
pub fn validate_batch(raw: Vec<Value>) -> Result<ValidationOutcome> {
    let mut valid: Vec<LineItem> = Vec::new();
    let mut invalid: Vec<InvalidLineItem> = Vec::new();
    let mut seen: HashSet<ItemId> = HashSet::new();

    for record in raw {
        match serde_json::from_value::<LineItem>(record.clone()) {
            Ok(mut item) => {
                item.ensure_id();
                if let Some(id) = &item.id {
                    if !seen.insert(id.clone()) {
                        continue;
                    }
                }
                valid.push(item);
            }
            Err(e) => invalid.push(InvalidLineItem {
                record,
                reason: e.to_string(),
            }),
        }
    }

    if valid.is_empty() {
        return Err(CatalogError::Validation {
            detail: "no valid line items in the received data".to_string(),
        });
    }

    Ok(ValidationOutcome { valid, invalid })
}

/// Validates a raw batch all-or-nothing.
///
/// Used for training-catalog replacement, where a partially valid corpus is
/// worse than no update at all.
///
/// # Errors
///
/// Returns `CatalogError::Validation` if any record fails, listing every
/// failing index with its reason.
pub fn validate_batch_strict(raw: Vec<Value>) -> Result<Vec<LineItem>> {
    let mut items: Vec<LineItem> = Vec::new();
    let mut failures: Vec<String> = Vec::new();

    for (index, record) in raw.into_iter().enumerate() {
        match serde_json::from_value::<LineItem>(record) {
            Ok(mut item) => {
                item.ensure_id();
                items.push(item);
            }
            Err(e) => failures.push(format!("index {index}: {e}")),
        }
    }

    if !failures.is_empty() {
        return Err(CatalogError::Validation {
            detail: format!("invalid line items: {}", failures.join("; ")),
        });
    }

    let mut seen: HashSet<ItemId> = HashSet::new();
    items.retain(|item| match &item.id {
        Some(id) => seen.insert(id.clone()),
        None => true,
    });

    Ok(items)
}
