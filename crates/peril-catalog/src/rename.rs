//! Rename/move executor: single-key and whole-subtree relocation.
//!
//! Every move is copy-then-delete. The two steps are not atomic; a crash
//! between them leaves both keys present, which is preferred over losing
//! data. Prefix moves fan out concurrently with no ordering guarantee.
//!
//! Retries after a partial move will find some source keys already gone;
//! the resulting `NotFound` is the caller's signal that the move already
//! happened.

use std::sync::Arc;

use futures::future::try_join_all;

use peril_core::{keys, DamageType, StorageBackend, SubstitutionKind, SubstitutionName};

use crate::error::{CatalogError, Result};

/// Relocates keys and whole subtrees.
pub struct RenameExecutor {
    storage: Arc<dyn StorageBackend>,
}

impl RenameExecutor {
    /// Creates a new rename executor.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Moves a single object: copy to the new key, then delete the old one.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the source doesn't exist, or a storage error if
    /// either step fails.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.storage.copy(old, new).await?;
        self.storage.delete(old).await?;
        Ok(())
    }

    /// Moves every key under a prefix, substituting the new prefix in-place.
    ///
    /// Only the first occurrence of the old prefix is replaced in each key,
    /// so repeated substrings deeper in a key stay untouched. Returns the
    /// number of keys moved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no key matches the old prefix, or a storage
    /// error if any copy or delete fails.
    pub async fn rename_prefix(&self, old_prefix: &str, new_prefix: &str) -> Result<usize> {
        self.relocate_prefix(old_prefix, new_prefix, false).await
    }

    /// Copies every key under a prefix without removing the sources.
    ///
    /// Same substitution rule as [`RenameExecutor::rename_prefix`]. Used for
    /// duplicating a damage-type tree.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no key matches the old prefix, or a storage
    /// error if any copy fails.
    pub async fn copy_prefix(&self, old_prefix: &str, new_prefix: &str) -> Result<usize> {
        self.relocate_prefix(old_prefix, new_prefix, true).await
    }

    /// Renames a whole damage type, keeping the master file's name in step
    /// with its directory.
    ///
    /// After the subtree moves, the old master travels along as
    /// `{new}/{old}.json`; when present it is renamed to `{new}/{new}.json`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the old damage type has no keys, or a storage
    /// error from any underlying move.
    pub async fn rename_damage_type(&self, old: &DamageType, new: &DamageType) -> Result<usize> {
        let moved = self
            .rename_prefix(&keys::damage_dir(old), &keys::damage_dir(new))
            .await?;

        let stray = keys::sibling_file(new, old);
        if self.storage.head(&stray).await?.is_some() {
            self.rename(&stray, &keys::master_file(new)).await?;
        }

        tracing::info!(old = %old, new = %new, moved, "renamed damage type");
        Ok(moved)
    }

    /// Renames a substitution file within one damage type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the source file doesn't exist, or a storage
    /// error if the move fails.
    pub async fn rename_substitution(
        &self,
        damage_type: &DamageType,
        kind: SubstitutionKind,
        old_name: &SubstitutionName,
        new_name: &SubstitutionName,
    ) -> Result<()> {
        self.rename(
            &keys::substitution_file(damage_type, kind, old_name),
            &keys::substitution_file(damage_type, kind, new_name),
        )
        .await
    }

    async fn relocate_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
        copy_only: bool,
    ) -> Result<usize> {
        let entries = self.storage.list(old_prefix).await?;
        if entries.is_empty() {
            return Err(CatalogError::NotFound {
                message: format!("no keys under prefix: {old_prefix}"),
            });
        }

        let moves: Vec<(String, String)> = entries
            .iter()
            .map(|meta| {
                let target = meta.path.replacen(old_prefix, new_prefix, 1);
                (meta.path.clone(), target)
            })
            .collect();

        try_join_all(moves.iter().map(|(from, to)| async move {
            self.storage.copy(from, to).await?;
            if !copy_only {
                self.storage.delete(from).await?;
            }
            Ok::<(), peril_core::Error>(())
        }))
        .await?;

        Ok(moves.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use peril_core::MemoryBackend;

    fn executor(storage: &Arc<dyn StorageBackend>) -> RenameExecutor {
        RenameExecutor::new(Arc::clone(storage))
    }

    #[tokio::test]
    async fn rename_moves_content() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage.put("old.json", Bytes::from("data")).await.unwrap();

        executor(&storage).rename("old.json", "new.json").await.unwrap();

        assert_eq!(storage.get("new.json").await.unwrap(), Bytes::from("data"));
        assert!(storage.head("old.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_missing_source_is_not_found() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let err = executor(&storage)
            .rename("missing.json", "new.json")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rename_prefix_moves_whole_subtree() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage.put("a/a.json", Bytes::from("m")).await.unwrap();
        storage
            .put("a/group/g.json", Bytes::from("g"))
            .await
            .unwrap();

        let moved = executor(&storage).rename_prefix("a/", "b/").await.unwrap();
        assert_eq!(moved, 2);

        assert_eq!(storage.get("b/a.json").await.unwrap(), Bytes::from("m"));
        assert_eq!(
            storage.get("b/group/g.json").await.unwrap(),
            Bytes::from("g")
        );
        assert!(storage.list("a/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_prefix_replaces_only_first_occurrence() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage.put("a/a/x.json", Bytes::from("x")).await.unwrap();

        executor(&storage).rename_prefix("a/", "b/").await.unwrap();

        assert!(storage.head("b/a/x.json").await.unwrap().is_some());
        assert!(storage.head("b/b/x.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_prefix_of_empty_tree_is_not_found() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let err = executor(&storage)
            .rename_prefix("missing/", "new/")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn copy_prefix_keeps_sources() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage.put("a/a.json", Bytes::from("m")).await.unwrap();

        let copied = executor(&storage).copy_prefix("a/", "b/").await.unwrap();
        assert_eq!(copied, 1);

        assert!(storage.head("a/a.json").await.unwrap().is_some());
        assert!(storage.head("b/a.json").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn damage_type_rename_fixes_master_name() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage
            .put("water/water.json", Bytes::from("m"))
            .await
            .unwrap();
        storage
            .put("water/group/ceiling.json", Bytes::from("g"))
            .await
            .unwrap();

        let old = DamageType::new("water").unwrap();
        let new = DamageType::new("flood").unwrap();
        executor(&storage)
            .rename_damage_type(&old, &new)
            .await
            .unwrap();

        assert_eq!(
            storage.get("flood/flood.json").await.unwrap(),
            Bytes::from("m")
        );
        assert!(storage.head("flood/water.json").await.unwrap().is_none());
        assert!(storage
            .head("flood/group/ceiling.json")
            .await
            .unwrap()
            .is_some());
        assert!(storage.list("water/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn substitution_rename_moves_between_names() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage
            .put("water/subtype/pipe.json", Bytes::from("s"))
            .await
            .unwrap();

        let dt = DamageType::new("water").unwrap();
        let old = SubstitutionName::new("pipe").unwrap();
        let new = SubstitutionName::new("burst_pipe").unwrap();
        executor(&storage)
            .rename_substitution(&dt, SubstitutionKind::Subtype, &old, &new)
            .await
            .unwrap();

        assert!(storage
            .head("water/subtype/burst_pipe.json")
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .head("water/subtype/pipe.json")
            .await
            .unwrap()
            .is_none());
    }
}
