//! # peril-catalog
//!
//! The damage-catalog consistency engine.
//!
//! This crate implements the catalog domain on top of `peril-core`'s flat
//! object storage:
//!
//! - **Identity**: content-derived line-item ids with duplicate suffixing
//!   for estimate payloads
//! - **Validation**: strict line-item checking that partitions a batch into
//!   valid items and rejected records
//! - **Consistency**: master updates whose id removals cascade into every
//!   substitution file of the same damage type
//! - **Backups**: dated seven-slot rotation plus a single temporary
//!   rollback slot refreshed before each destructive update
//! - **Requests**: tagged request types that map the outer API's optional
//!   fields onto engine operations
//!
//! ## Update Flow
//!
//! A master update is ordered so that every risky step happens after the
//! snapshot and before the commit:
//!
//! ```text
//! raw items -> validate -> temporary backup -> diff ids against old master
//!           -> cascade removals into substitutions -> overwrite master
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use peril_catalog::prelude::*;
//! use peril_core::{DamageType, MemoryBackend};
//!
//! let engine = CatalogEngine::new(Arc::new(MemoryBackend::new()));
//! let damage_type = DamageType::new("Water Damage")?;
//! let report = engine.update_master(&damage_type, items).await?;
//! println!("{}", report.message);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backup;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod identity;
pub mod line_item;
pub mod rename;
pub mod request;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use peril_catalog::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backup::{BackupManager, BackupPolicy};
    pub use crate::engine::{CatalogEngine, DirectoryContents, UpdateReport};
    pub use crate::error::{CatalogError, Result};
    pub use crate::line_item::{InvalidLineItem, LineItem, ValidationOutcome};
    pub use crate::rename::RenameExecutor;
    pub use crate::request::{
        DeleteRequest, RenameRequest, SaveRequest, SubstitutionPayload, UpdateRequest,
    };
}

pub use backup::{BackupManager, BackupPolicy};
pub use engine::{CatalogEngine, DirectoryContents, UpdateReport};
pub use error::{CatalogError, Result};
pub use estimate::{Area, EstimateDocument, EstimateLineItem};
pub use identity::{suffix_duplicates, ItemId};
pub use line_item::{
    validate_batch, validate_batch_strict, InvalidLineItem, LineItem, ValidationOutcome,
};
pub use rename::RenameExecutor;
pub use request::{DeleteRequest, RenameRequest, SaveRequest, SubstitutionPayload, UpdateRequest};
