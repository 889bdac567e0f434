//! Request types mapping optional-field combinations onto engine operations.
//!
//! The outer API hands the catalog loosely-shaped requests: a damage type
//! here, a payload there, maybe a substitution descriptor. Each request kind
//! enumerates its valid field combinations as enum variants. The `from_parts`
//! constructors accept exactly those combinations and reject everything else
//! at the boundary, so the engine itself never branches on which fields were
//! present.

use serde::Deserialize;
use serde_json::Value;

use peril_core::{keys, DamageType, SubstitutionKind, SubstitutionName};

use crate::engine::{CatalogEngine, UpdateReport};
use crate::error::{CatalogError, Result};
use crate::line_item::{validate_batch, LineItem};

/// A named substitution payload as supplied by the outer API.
///
/// The raw `name` is normalized (lowercased, spaces to underscores) when the
/// request is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct SubstitutionPayload {
    /// Raw substitution file name, before normalization.
    pub name: String,
    /// File body, usually a list of line items.
    pub body: Value,
}

// ============================================================================
// Save
// ============================================================================

/// A validated save request: an unconditional overwrite of one catalog
/// object, without validation or cascade.
#[derive(Debug, Clone)]
pub enum SaveRequest {
    /// Overwrite a damage type's master file.
    Master {
        /// Target damage type.
        damage_type: DamageType,
        /// Whole-file payload, written as-is.
        payload: Value,
    },
    /// Overwrite a single substitution file.
    Substitution {
        /// Owning damage type.
        damage_type: DamageType,
        /// Substitution directory the file lives in.
        kind: SubstitutionKind,
        /// Normalized substitution file name.
        name: SubstitutionName,
        /// Whole-file payload, written as-is.
        payload: Value,
    },
    /// Merge entries into the type index at the storage root.
    TypeIndex {
        /// Entries merged into the index.
        payload: Value,
    },
}

impl SaveRequest {
    /// Builds a save request from the raw optional fields of the outer API.
    ///
    /// Accepted combinations: damage type with a data payload (master
    /// write), damage type with a substitution kind and payload
    /// (substitution write), or a type-index payload alone.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for any other combination or for names that
    /// fail normalization.
    pub fn from_parts(
        damage_type: Option<&str>,
        data: Option<Value>,
        type_index: Option<Value>,
        substitution_kind: Option<&str>,
        substitution: Option<SubstitutionPayload>,
    ) -> Result<Self> {
        match (damage_type, data, type_index, substitution_kind, substitution) {
            (Some(damage_type), Some(payload), None, None, None) => Ok(Self::Master {
                damage_type: DamageType::new(damage_type)?,
                payload,
            }),
            (Some(damage_type), None, None, Some(kind), Some(substitution)) => {
                Ok(Self::Substitution {
                    damage_type: DamageType::new(damage_type)?,
                    kind: kind.parse()?,
                    name: SubstitutionName::new(&substitution.name)?,
                    payload: substitution.body,
                })
            }
            (None, None, Some(payload), None, None) => Ok(Self::TypeIndex { payload }),
            _ => Err(invalid_combination()),
        }
    }

    /// Applies the save to the engine and returns a status message.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails; a type-index merge can also
    /// surface the merge errors (`InvalidRequest`, `Serialization`).
    pub async fn apply(self, engine: &CatalogEngine) -> Result<String> {
        match self {
            Self::Master {
                damage_type,
                payload,
            } => {
                let path = keys::master_file(&damage_type);
                engine.write(&path, &payload).await?;
                Ok(format!("saved {path}"))
            }
            Self::Substitution {
                damage_type,
                kind,
                name,
                payload,
            } => {
                let path = keys::substitution_file(&damage_type, kind, &name);
                engine.write(&path, &payload).await?;
                Ok(format!("saved {path}"))
            }
            Self::TypeIndex { payload } => engine.merge(keys::TYPE_INDEX, payload).await,
        }
    }
}

// ============================================================================
// Update
// ============================================================================

/// A validated update request: a catalog mutation that validates line items
/// and reports what was rejected.
#[derive(Debug, Clone)]
pub enum UpdateRequest {
    /// Replace a master file, cascading id removals into its substitutions.
    Master {
        /// Target damage type.
        damage_type: DamageType,
        /// Raw line-item records for the new master.
        items: Vec<Value>,
    },
    /// Merge validated line items into a substitution file.
    Substitution {
        /// Owning damage type.
        damage_type: DamageType,
        /// Substitution directory the file lives in.
        kind: SubstitutionKind,
        /// Normalized substitution file name.
        name: SubstitutionName,
        /// Raw line-item records to merge.
        items: Vec<Value>,
    },
    /// Merge entries into the type index at the storage root.
    TypeIndex {
        /// Entries merged into the index.
        payload: Value,
    },
}

impl UpdateRequest {
    /// Builds an update request from the raw optional fields of the outer
    /// API.
    ///
    /// Accepted combinations mirror [`SaveRequest::from_parts`], except that
    /// master and substitution payloads must be lists of line items.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for any other combination, for names that
    /// fail normalization, or for a non-list payload.
    pub fn from_parts(
        damage_type: Option<&str>,
        data: Option<Value>,
        type_index: Option<Value>,
        substitution_kind: Option<&str>,
        substitution: Option<SubstitutionPayload>,
    ) -> Result<Self> {
        match (damage_type, data, type_index, substitution_kind, substitution) {
            (Some(damage_type), Some(data), None, None, None) => Ok(Self::Master {
                damage_type: DamageType::new(damage_type)?,
                items: expect_items(data)?,
            }),
            (Some(damage_type), None, None, Some(kind), Some(substitution)) => {
                Ok(Self::Substitution {
                    damage_type: DamageType::new(damage_type)?,
                    kind: kind.parse()?,
                    name: SubstitutionName::new(&substitution.name)?,
                    items: expect_items(substitution.body)?,
                })
            }
            (None, None, Some(payload), None, None) => Ok(Self::TypeIndex { payload }),
            _ => Err(invalid_combination()),
        }
    }

    /// Applies the update to the engine.
    ///
    /// Master updates run the full consistency flow: validate, snapshot,
    /// cascade removals, overwrite. Substitution updates validate the batch
    /// and merge the surviving items into the target file. Both report the
    /// rejected records; a type-index merge has nothing to reject.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no record in the batch survives, and
    /// `Storage` if a write fails.
    pub async fn apply(self, engine: &CatalogEngine) -> Result<UpdateReport> {
        match self {
            Self::Master { damage_type, items } => engine.update_master(&damage_type, items).await,
            Self::Substitution {
                damage_type,
                kind,
                name,
                items,
            } => {
                let outcome = validate_batch(items)?;
                let path = keys::substitution_file(&damage_type, kind, &name);
                let valid = items_to_values(&outcome.valid)?;
                let message = engine.merge(&path, Value::Array(valid)).await?;
                Ok(UpdateReport {
                    message,
                    invalid: outcome.invalid,
                })
            }
            Self::TypeIndex { payload } => {
                let message = engine.merge(keys::TYPE_INDEX, payload).await?;
                Ok(UpdateReport {
                    message,
                    invalid: Vec::new(),
                })
            }
        }
    }
}

// ============================================================================
// Delete
// ============================================================================

/// A validated delete request.
///
/// Substitution coordinates are all-or-nothing: a kind without a name, or a
/// name without a damage type, is rejected rather than resolved to a
/// half-formed key.
#[derive(Debug, Clone)]
pub enum DeleteRequest {
    /// Remove a damage type and everything under it.
    Directory {
        /// Damage type whose directory is removed.
        damage_type: DamageType,
    },
    /// Remove a single substitution file.
    Substitution {
        /// Owning damage type.
        damage_type: DamageType,
        /// Substitution directory the file lives in.
        kind: SubstitutionKind,
        /// Normalized substitution file name.
        name: SubstitutionName,
    },
}

impl DeleteRequest {
    /// Builds a delete request from the raw optional fields of the outer
    /// API.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for partial substitution coordinates or any
    /// other unsupported combination.
    pub fn from_parts(
        damage_type: Option<&str>,
        substitution_kind: Option<&str>,
        substitution_name: Option<&str>,
    ) -> Result<Self> {
        match (damage_type, substitution_kind, substitution_name) {
            (Some(damage_type), None, None) => Ok(Self::Directory {
                damage_type: DamageType::new(damage_type)?,
            }),
            (Some(damage_type), Some(kind), Some(name)) => Ok(Self::Substitution {
                damage_type: DamageType::new(damage_type)?,
                kind: kind.parse()?,
                name: SubstitutionName::new(name)?,
            }),
            _ => Err(invalid_combination()),
        }
    }

    /// Applies the delete to the engine and returns a status message.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when a single-file delete targets a missing key,
    /// and `Storage` if the backend fails.
    pub async fn apply(self, engine: &CatalogEngine) -> Result<String> {
        match self {
            Self::Directory { damage_type } => {
                let prefix = keys::damage_dir(&damage_type);
                let removed = engine.delete_prefix(&prefix).await?;
                Ok(format!("deleted {removed} objects under {prefix}"))
            }
            Self::Substitution {
                damage_type,
                kind,
                name,
            } => {
                let path = keys::substitution_file(&damage_type, kind, &name);
                engine.delete(&path).await?;
                Ok(format!("deleted {path}"))
            }
        }
    }
}

// ============================================================================
// Rename
// ============================================================================

/// A validated rename request.
#[derive(Debug, Clone)]
pub enum RenameRequest {
    /// Rename a whole damage type, keeping its master file in step.
    DamageType {
        /// Current damage type.
        old: DamageType,
        /// Replacement damage type.
        new: DamageType,
    },
    /// Rename a substitution file within its damage type.
    Substitution {
        /// Owning damage type.
        damage_type: DamageType,
        /// Substitution directory the file lives in.
        kind: SubstitutionKind,
        /// Current file name.
        old_name: SubstitutionName,
        /// Replacement file name.
        new_name: SubstitutionName,
    },
}

impl RenameRequest {
    /// Builds a rename request from the raw optional fields of the outer
    /// API.
    ///
    /// Accepted combinations: a damage type with its replacement, or a
    /// damage type with a substitution kind and both file names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for any other combination or for names that
    /// fail normalization.
    pub fn from_parts(
        damage_type: Option<&str>,
        new_damage_type: Option<&str>,
        substitution_kind: Option<&str>,
        old_name: Option<&str>,
        new_name: Option<&str>,
    ) -> Result<Self> {
        match (
            damage_type,
            new_damage_type,
            substitution_kind,
            old_name,
            new_name,
        ) {
            (Some(old), Some(new), None, None, None) => Ok(Self::DamageType {
                old: DamageType::new(old)?,
                new: DamageType::new(new)?,
            }),
            (Some(damage_type), None, Some(kind), Some(old_name), Some(new_name)) => {
                Ok(Self::Substitution {
                    damage_type: DamageType::new(damage_type)?,
                    kind: kind.parse()?,
                    old_name: SubstitutionName::new(old_name)?,
                    new_name: SubstitutionName::new(new_name)?,
                })
            }
            _ => Err(invalid_combination()),
        }
    }

    /// Applies the rename to the engine and returns a status message.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the source does not exist and `Storage` if
    /// the backend fails mid-move.
    pub async fn apply(self, engine: &CatalogEngine) -> Result<String> {
        match self {
            Self::DamageType { old, new } => {
                let moved = engine.renames().rename_damage_type(&old, &new).await?;
                Ok(format!("renamed {old} to {new} ({moved} objects)"))
            }
            Self::Substitution {
                damage_type,
                kind,
                old_name,
                new_name,
            } => {
                engine
                    .renames()
                    .rename_substitution(&damage_type, kind, &old_name, &new_name)
                    .await?;
                let path = keys::substitution_file(&damage_type, kind, &new_name);
                Ok(format!("renamed to {path}"))
            }
        }
    }
}

fn expect_items(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        _ => Err(CatalogError::InvalidRequest {
            message: "update payload must be a list of line items".to_string(),
        }),
    }
}

fn items_to_values(items: &[LineItem]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| {
            serde_json::to_value(item).map_err(|e| CatalogError::Serialization {
                message: format!("serialize line item: {e}"),
            })
        })
        .collect()
}

fn invalid_combination() -> CatalogError {
    CatalogError::InvalidRequest {
        message: "invalid combination of request parameters".to_string(),
    }
}
