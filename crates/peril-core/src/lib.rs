//! # peril-core
//!
//! Core abstractions for the Peril damage-catalog engine.
//!
//! This crate provides the foundational types and traits used across all Peril components:
//!
//! - **Storage**: The `StorageBackend` trait with in-memory and S3 backends
//! - **Keys**: The flat object namespace for catalog documents and backups
//! - **Error Types**: Shared error definitions and result types
//! - **Configuration**: Environment-driven runtime configuration
//! - **Observability**: Structured logging initialization
//!
//! ## Storage Layout
//!
//! All catalog state lives in one flat key namespace:
//!
//! ```text
//! {damage_type}/{damage_type}.json      master line-item file
//! {damage_type}/subtype/{name}.json     substitution file
//! {damage_type}/group/{name}.json       substitution file
//! backup/{DDMMYYYY}/...                 dated backup folders
//! temporary_backup/...                  single rollback slot
//! TrainAllLineItems.json                training catalog
//! damage_type.json                      type index
//! ```
//!
//! ## Example
//!
//! ```rust
//! use peril_core::prelude::*;
//!
//! let damage_type = DamageType::new("Water Damage").unwrap();
//! assert_eq!(keys::master_file(&damage_type), "water_damage/water_damage.json");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod keys;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use peril_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::keys::{self, DamageType, SubstitutionKind, SubstitutionName};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend};
}

pub use config::Config;
pub use error::{Error, Result};
pub use keys::{DamageType, SubstitutionKind, SubstitutionName};
pub use observability::{init_logging, LogFormat};
pub use storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend};
