//! The damage-catalog consistency engine.
//!
//! The engine owns every mutation of the catalog namespace. Its central
//! algorithm is the master update: validate the incoming items, snapshot
//! the tree to the temporary backup slot, diff the old master against the
//! new one by id, prune every removed id out of the substitution files
//! under the same damage type, then overwrite the master.
//!
//! The store offers no cross-key transactions, so consistency comes from
//! ordering alone: snapshot before risk, cascade before commit. A crash
//! between cascade and commit leaves substitution files pruned and the
//! master stale; the next update recomputes the difference against the
//! already-pruned files and converges. Re-running any update after a crash
//! is safe.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use peril_core::{keys, DamageType, StorageBackend, SubstitutionKind};

use crate::backup::{BackupManager, BackupPolicy};
use crate::error::{CatalogError, Result};
use crate::identity::ItemId;
use crate::line_item::{validate_batch, validate_batch_strict, InvalidLineItem};
use crate::rename::RenameExecutor;

/// Report returned by destructive catalog updates.
///
/// Callers must surface both halves: the status message and the records
/// the validator rejected.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    /// Human-readable status.
    pub message: String,
    /// Records rejected by the validator, each with its reason.
    pub invalid: Vec<InvalidLineItem>,
}

/// Contents of one damage type's directory, grouped by substitution kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryContents {
    /// The damage type that was listed.
    pub damage_type: String,
    /// Key of the master file.
    pub master: String,
    /// Substitution file keys under `subtype/`.
    pub subtype: Vec<String>,
    /// Substitution file keys under `group/`.
    pub group: Vec<String>,
}

/// The consistency engine over one storage backend.
pub struct CatalogEngine {
    storage: Arc<dyn StorageBackend>,
    backups: BackupManager,
    renames: RenameExecutor,
}

impl CatalogEngine {
    /// Creates an engine with the default backup policy.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_policy(storage, BackupPolicy::default())
    }

    /// Creates an engine with a custom backup policy.
    #[must_use]
    pub fn with_policy(storage: Arc<dyn StorageBackend>, policy: BackupPolicy) -> Self {
        Self {
            backups: BackupManager::new(Arc::clone(&storage), policy),
            renames: RenameExecutor::new(Arc::clone(&storage)),
            storage,
        }
    }

    /// Returns the backup manager.
    #[must_use]
    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Returns the rename executor.
    #[must_use]
    pub fn renames(&self) -> &RenameExecutor {
        &self.renames
    }

    // ========================================================================
    // Master update
    // ========================================================================

    /// Replaces a damage type's master file, cascading id removals.
    ///
    /// Steps, in order: validate the raw items (fatal only when nothing
    /// survives), snapshot the tree to the temporary backup slot, read the
    /// old master, compute the ids that disappeared, prune them from every
    /// substitution file under the damage type, overwrite the master. A
    /// missing master means a first write: diff and cascade are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no item survives validation, or a storage
    /// error from any step. Completed cascade writes are not rolled back on
    /// failure; rerunning the update converges.
    pub async fn update_master(
        &self,
        damage_type: &DamageType,
        raw_items: Vec<Value>,
    ) -> Result<UpdateReport> {
        let outcome = validate_batch(raw_items)?;
        self.backups.temporary_backup().await?;

        let master = keys::master_file(damage_type);
        let old_items: Option<Vec<Value>> = match self.storage.get(&master).await {
            Ok(bytes) => Some(parse_json(&master, &bytes)?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(old_items) = old_items {
            let new_ids: HashSet<&str> = outcome
                .valid
                .iter()
                .filter_map(|item| item.id.as_ref().map(ItemId::as_str))
                .collect();
            let removed: HashSet<String> = old_items
                .iter()
                .filter_map(|item| item.get("Id").and_then(Value::as_str))
                .filter(|id| !new_ids.contains(id))
                .map(ToString::to_string)
                .collect();

            if !removed.is_empty() {
                self.cascade_removals(damage_type, &removed).await?;
            }
        }

        self.write_json(&master, &outcome.valid).await?;
        tracing::info!(
            damage_type = %damage_type,
            items = outcome.valid.len(),
            invalid = outcome.invalid.len(),
            "master catalog updated"
        );

        Ok(UpdateReport {
            message: format!("updated {master}"),
            invalid: outcome.invalid,
        })
    }

    /// Rewrites every substitution file under the damage type without the
    /// removed ids. Fan-out is concurrent and unordered; each file rewrite
    /// is a single full overwrite. Items lacking an id are kept.
    async fn cascade_removals(
        &self,
        damage_type: &DamageType,
        removed: &HashSet<String>,
    ) -> Result<()> {
        let master = keys::master_file(damage_type);
        let targets: Vec<String> = self
            .storage
            .list(&keys::damage_dir(damage_type))
            .await?
            .into_iter()
            .map(|meta| meta.path)
            .filter(|path| *path != master && !path.ends_with('/'))
            .collect();

        try_join_all(targets.iter().map(|path| async move {
            let items: Vec<Value> = self.read_json(path).await?;
            let kept: Vec<Value> = items
                .into_iter()
                .filter(|item| {
                    item.get("Id")
                        .and_then(Value::as_str)
                        .is_none_or(|id| !removed.contains(id))
                })
                .collect();
            self.write_json(path, &kept).await
        }))
        .await?;

        tracing::info!(
            damage_type = %damage_type,
            removed = removed.len(),
            files = targets.len(),
            "cascaded id removals"
        );
        Ok(())
    }

    // ========================================================================
    // Merge update
    // ========================================================================

    /// Merges a partial payload into an existing object.
    ///
    /// An object payload is a shallow key union with new values winning. A
    /// list payload is a union by `Id`: matched old entries are replaced in
    /// place, unmatched old entries keep their position, new-only entries
    /// are appended; the pre-merge file is copied into the temporary backup
    /// slot first. A missing target degenerates to a plain create.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for scalar payloads or list elements without
    /// a string `Id`, `Serialization` when the stored content doesn't match
    /// the payload shape, or a storage error.
    pub async fn merge(&self, path: &str, payload: Value) -> Result<String> {
        let current = match self.storage.get(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                self.write(path, &payload).await?;
                return Ok(format!("created {path}"));
            }
            Err(e) => return Err(e.into()),
        };

        match payload {
            Value::Object(new_entries) => {
                let mut merged: serde_json::Map<String, Value> = parse_json(path, &current)?;
                merged.extend(new_entries);
                self.write_json(path, &Value::Object(merged)).await?;
            }
            Value::Array(new_items) => {
                self.backups.snapshot_keys(&[path.to_string()]).await?;
                let old_items: Vec<Value> = parse_json(path, &current)?;
                let merged = union_merge_by_id(old_items, new_items)?;
                self.write_json(path, &merged).await?;
            }
            _ => {
                return Err(CatalogError::InvalidRequest {
                    message: "merge payload must be an object or a list".to_string(),
                })
            }
        }

        Ok(format!("updated {path}"))
    }

    // ========================================================================
    // Plain object operations
    // ========================================================================

    /// Reads a whole JSON object.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key doesn't exist, or `Serialization` if
    /// the content is not valid JSON.
    pub async fn read(&self, path: &str) -> Result<Value> {
        self.read_json(path).await
    }

    /// Overwrites a key with the given payload unconditionally.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn write(&self, path: &str, payload: &Value) -> Result<()> {
        self.write_json(path, payload).await
    }

    /// Deletes a single key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key doesn't exist; an explicitly named
    /// delete target is surfaced, unlike the idempotent backend delete.
    pub async fn delete(&self, path: &str) -> Result<()> {
        if self.storage.head(path).await?.is_none() {
            return Err(CatalogError::NotFound {
                message: format!("object not found: {path}"),
            });
        }
        if let Err(e) = self.storage.delete(path).await {
            tracing::error!(path = %path, error = %e, "delete failed");
            return Err(e.into());
        }
        Ok(())
    }

    /// Deletes every key under a prefix. Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the prefix holds no keys, or a storage error if
    /// the batch delete fails.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let targets: Vec<String> = self
            .storage
            .list(prefix)
            .await?
            .into_iter()
            .map(|meta| meta.path)
            .collect();

        if targets.is_empty() {
            return Err(CatalogError::NotFound {
                message: format!("directory not found: {prefix}"),
            });
        }

        if let Err(e) = self.storage.delete_batch(&targets).await {
            tracing::error!(prefix = %prefix, error = %e, "prefix delete failed");
            return Err(e.into());
        }
        Ok(targets.len())
    }

    /// Lists the keys under a prefix, sorted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the prefix holds no keys.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .storage
            .list(prefix)
            .await?
            .into_iter()
            .map(|meta| meta.path)
            .collect();

        if paths.is_empty() {
            return Err(CatalogError::NotFound {
                message: format!("directory not found: {prefix}"),
            });
        }

        paths.sort();
        Ok(paths)
    }

    /// Returns `true` if the key exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.storage.head(path).await?.is_some())
    }

    /// Lists a damage type's files grouped by substitution kind.
    ///
    /// A key belongs to a kind when that kind appears as one of its path
    /// segments; everything else is left out of the groups.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the damage type directory holds no keys.
    pub async fn directory_contents(&self, damage_type: &DamageType) -> Result<DirectoryContents> {
        let paths = self.list_prefix(&keys::damage_dir(damage_type)).await?;

        let mut grouped: HashMap<SubstitutionKind, Vec<String>> = HashMap::new();
        for path in &paths {
            for kind in SubstitutionKind::ALL {
                if path.split('/').any(|segment| segment == kind.as_str()) {
                    grouped.entry(kind).or_default().push(path.clone());
                    break;
                }
            }
        }

        Ok(DirectoryContents {
            damage_type: damage_type.to_string(),
            master: keys::master_file(damage_type),
            subtype: grouped.remove(&SubstitutionKind::Subtype).unwrap_or_default(),
            group: grouped.remove(&SubstitutionKind::Group).unwrap_or_default(),
        })
    }

    // ========================================================================
    // Training catalog
    // ========================================================================

    /// Replaces the training catalog wholesale.
    ///
    /// Validation is all-or-nothing: one bad record rejects the batch.
    /// Returns the number of items written.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every failing index, or a storage error
    /// if the write fails.
    pub async fn replace_training_catalog(&self, raw_items: Vec<Value>) -> Result<usize> {
        let items = validate_batch_strict(raw_items)?;
        self.write_json(keys::TRAINING_CATALOG, &items).await?;
        tracing::info!(items = items.len(), "training catalog replaced");
        Ok(items.len())
    }

    /// Union-merges a batch into the training catalog.
    ///
    /// Tolerant validation, then the same id-union as a list merge: old
    /// order kept, new wins in place, new-only items appended. The current
    /// file is copied into the temporary backup slot before the write.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no item survives, `NotFound` when the
    /// training catalog doesn't exist yet, or a storage error.
    pub async fn merge_training_catalog(&self, raw_items: Vec<Value>) -> Result<UpdateReport> {
        let outcome = validate_batch(raw_items)?;
        self.backups
            .snapshot_keys(&[keys::TRAINING_CATALOG.to_string()])
            .await?;

        let old_items: Vec<Value> = self.read_json(keys::TRAINING_CATALOG).await?;
        let new_items: Vec<Value> = outcome
            .valid
            .iter()
            .map(|item| {
                serde_json::to_value(item).map_err(|e| CatalogError::Serialization {
                    message: format!("serialize line item: {e}"),
                })
            })
            .collect::<Result<_>>()?;

        let merged = union_merge_by_id(old_items, new_items)?;
        self.write_json(keys::TRAINING_CATALOG, &merged).await?;

        tracing::info!(items = merged.len(), "training catalog merged");
        Ok(UpdateReport {
            message: format!("updated {}", keys::TRAINING_CATALOG),
            invalid: outcome.invalid,
        })
    }

    // ========================================================================
    // Backup and rename delegation
    // ========================================================================

    /// Runs the dated backup rotation. Returns the number of keys copied.
    ///
    /// # Errors
    ///
    /// Returns an error if listing, eviction, or any copy fails.
    pub async fn daily_backup(&self) -> Result<usize> {
        self.backups.daily_backup().await
    }

    /// Restores the catalog from the temporary backup slot.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the slot is empty, or a storage error.
    pub async fn rollback(&self) -> Result<usize> {
        self.backups.rollback().await
    }

    /// Moves a single key.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the source doesn't exist, or a storage error.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.renames.rename(old, new).await
    }

    /// Moves every key under a prefix. Returns the number of keys moved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the prefix holds no keys, or a storage error.
    pub async fn rename_prefix(&self, old_prefix: &str, new_prefix: &str) -> Result<usize> {
        self.renames.rename_prefix(old_prefix, new_prefix).await
    }

    /// Copies every key under a prefix. Returns the number of keys copied.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the prefix holds no keys, or a storage error.
    pub async fn copy_prefix(&self, old_prefix: &str, new_prefix: &str) -> Result<usize> {
        self.renames.copy_prefix(old_prefix, new_prefix).await
    }

    // ========================================================================
    // JSON helpers
    // ========================================================================

    async fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let bytes = self.storage.get(path).await?;
        parse_json(path, &bytes)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_vec(value).map_err(|e| CatalogError::Serialization {
            message: format!("serialize JSON for {path}: {e}"),
        })?;
        if let Err(e) = self.storage.put(path, Bytes::from(encoded)).await {
            tracing::error!(path = %path, error = %e, "storage write failed");
            return Err(e.into());
        }
        Ok(())
    }
}

fn parse_json<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CatalogError::Serialization {
        message: format!("parse JSON at {path}: {e}"),
    })
}

/// Unions two id-keyed lists: matched old entries are replaced in place,
/// unmatched old entries keep their position, new-only entries are appended
/// in their own order. A repeated id on either side keeps only its first
/// occurrence, so the merged list never carries a duplicate id.
fn union_merge_by_id(old: Vec<Value>, new: Vec<Value>) -> Result<Vec<Value>> {
    let mut replacements: HashMap<String, usize> = HashMap::new();
    let mut incoming: Vec<Option<Value>> = Vec::with_capacity(new.len());
    for item in new {
        match replacements.entry(merge_id(&item)?) {
            Entry::Vacant(slot) => {
                slot.insert(incoming.len());
                incoming.push(Some(item));
            }
            Entry::Occupied(_) => incoming.push(None),
        }
    }

    let mut merged = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();
    for item in old {
        let id = merge_id(&item)?;
        if !emitted.insert(id.clone()) {
            continue;
        }
        match replacements.get(&id).and_then(|&index| incoming[index].take()) {
            Some(replacement) => merged.push(replacement),
            None => merged.push(item),
        }
    }
    merged.extend(incoming.into_iter().flatten());
    Ok(merged)
}

fn merge_id(item: &Value) -> Result<String> {
    item.get("Id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| CatalogError::InvalidRequest {
            message: "every list element must carry a string \"Id\"".to_string(),
        })
}
