//! Estimate payload tree from the PDF-ingestion path.
//!
//! Estimates arrive as a looser document than catalog files: priced line
//! items grouped into nested areas, with short field aliases on the wire.
//! The tree gets the same content-derived identity as the catalog, plus the
//! duplicate-suffixing rule: within one list, colliding ids after the first
//! become `{hash}_1`, `{hash}_2`, ...

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{suffix_duplicates, ItemId};

/// One priced line item inside an estimate.
///
/// Accepts both the long field names and the `cat`/`sel`/`desc` wire
/// aliases on input; always writes the long names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateLineItem {
    /// Content-derived identity; assigned by the identity pass when absent.
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    /// Category code.
    #[serde(rename = "Category", alias = "cat")]
    pub category: String,
    /// Selector code within the category.
    #[serde(rename = "Selector", alias = "sel")]
    pub selector: String,
    /// Human-readable description.
    #[serde(rename = "Description", alias = "desc")]
    pub description: String,
    /// Price per unit.
    #[serde(rename = "UnitPrice", default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    /// Quantity formula as supplied by the estimator.
    #[serde(rename = "Calculation", default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
    /// Quantity; the wire sends these as strings.
    #[serde(rename = "Quantity", default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    /// Reset cost component.
    #[serde(rename = "Reset", default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<f64>,
    /// Removal cost component.
    #[serde(rename = "Remove", default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<f64>,
    /// Replacement cost component.
    #[serde(rename = "Replace", default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<f64>,
    /// Line subtotal.
    #[serde(rename = "Subtotal", default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    /// Overhead and profit amount.
    #[serde(
        rename = "OverheadProfit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub overhead_profit: Option<f64>,
    /// Line total.
    #[serde(rename = "Total", default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Action verb (remove, replace, ...).
    #[serde(rename = "Action", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Tax amount.
    #[serde(rename = "Tax", default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    /// Free-form note.
    #[serde(rename = "Note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Position in the source document.
    #[serde(rename = "LineNumber", default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<i64>,
    /// Unit of measure.
    #[serde(rename = "Unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Page coordinates in the source document.
    #[serde(rename = "Position", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    /// Reviewer comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
}

impl EstimateLineItem {
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

/// A room or region of the estimate with its items and nested child areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Line items belonging directly to this area.
    #[serde(rename = "LineItems")]
    pub line_items: Vec<EstimateLineItem>,
    /// Nested sub-areas.
    #[serde(rename = "ChildAreas")]
    pub child_areas: Vec<Area>,
    /// Area classification.
    #[serde(rename = "areaType", default, skip_serializing_if = "Option::is_none")]
    pub area_type: Option<String>,
    /// Display name of the area.
    #[serde(rename = "AreaName")]
    pub area_name: String,
    /// Wall surface in square feet.
    #[serde(rename = "SFWall", default, skip_serializing_if = "Option::is_none")]
    pub sf_wall: Option<f64>,
    /// Ceiling surface in square feet.
    #[serde(rename = "SFCeiling", default, skip_serializing_if = "Option::is_none")]
    pub sf_ceiling: Option<f64>,
    /// Combined wall and ceiling surface in square feet.
    #[serde(
        rename = "SFWallsCeiling",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sf_walls_ceiling: Option<f64>,
    /// Floor surface in square feet.
    #[serde(rename = "SFFloor", default, skip_serializing_if = "Option::is_none")]
    pub sf_floor: Option<f64>,
    /// Floor surface in square yards.
    #[serde(rename = "SYFloor", default, skip_serializing_if = "Option::is_none")]
    pub sy_floor: Option<f64>,
    /// Floor perimeter in linear feet.
    #[serde(rename = "LFFloor", default, skip_serializing_if = "Option::is_none")]
    pub lf_floor: Option<f64>,
    /// Ceiling perimeter in linear feet.
    #[serde(rename = "LFCeiling", default, skip_serializing_if = "Option::is_none")]
    pub lf_ceiling: Option<f64>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether the area still needs an estimate.
    #[serde(
        rename = "isRequiresEstimate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_requires_estimate: Option<bool>,
}

impl Area {
    /// Runs the identity pass over this area and every nested child.
    ///
    /// Each list is handled independently: items get their id derived when
    /// absent, then duplicates within the list are suffixed.
    pub fn assign_identities(&mut self) {
        assign_list(&mut self.line_items);
        for child in &mut self.child_areas {
            child.assign_identities();
        }
    }
}

/// Full estimate payload returned by the estimation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateDocument {
    /// Estimate identifier assigned by the estimation service.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Property address.
    #[serde(rename = "Address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Insurance claim reference.
    #[serde(rename = "Claim", default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
    /// Client name.
    #[serde(rename = "Client", default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Property city.
    #[serde(rename = "City", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Property postal code.
    #[serde(rename = "Postal", default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
    /// Name of the document the estimate was produced from.
    #[serde(rename = "SubmittedFile")]
    pub submitted_file: String,
    /// Sum of all line totals.
    #[serde(rename = "LineItemTotal")]
    pub line_item_total: f64,
    /// Line items not attached to any area.
    #[serde(rename = "LineItems")]
    pub line_items: Vec<EstimateLineItem>,
    /// Estimated areas.
    #[serde(rename = "Areas")]
    pub areas: Vec<Area>,
}

impl EstimateDocument {
    /// Runs the identity pass over the whole document.
    pub fn assign_identities(&mut self) {
        assign_list(&mut self.line_items);
        for area in &mut self.areas {
            area.assign_identities();
        }
    }
}

fn assign_list(items: &mut [EstimateLineItem]) {
    for item in items.iter_mut() {
        item.ensure_id();
    }
    let ids = suffix_duplicates(
        items
            .iter()
            .map(|item| {
                item.id.clone().unwrap_or_else(|| {
                    ItemId::derive(&item.category, &item.selector, &item.description)
                })
            })
            .collect(),
    );
    for (item, id) in items.iter_mut().zip(ids) {
        item.id = Some(id);
    }
}
