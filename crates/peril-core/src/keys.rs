//! Typed keys for the damage-catalog object namespace.
//!
//! This module is the single source of truth for how catalog documents are
//! laid out in the flat object store. Everything else builds keys through
//! these functions instead of formatting path strings inline.
//!
//! # Layout
//!
//! | Purpose | Key pattern |
//! |---------|-------------|
//! | Master damage file | `{damage_type}/{damage_type}.json` |
//! | Substitution file | `{damage_type}/{subtype\|group}/{name}.json` |
//! | Damage type directory | `{damage_type}/` |
//! | Dated backup | `backup/{DDMMYYYY}/{original key}` |
//! | Temporary backup | `temporary_backup/{original key}` |
//! | Training catalog | `TrainAllLineItems.json` |
//! | Type index | `damage_type.json` |
//!
//! # Example
//!
//! ```rust
//! use peril_core::keys::{self, DamageType, SubstitutionKind, SubstitutionName};
//!
//! let dt = DamageType::new("Water Damage").unwrap();
//! assert_eq!(dt.as_str(), "water_damage");
//! assert_eq!(keys::master_file(&dt), "water_damage/water_damage.json");
//!
//! let name = SubstitutionName::new("ceiling").unwrap();
//! assert_eq!(
//!     keys::substitution_file(&dt, SubstitutionKind::Group, &name),
//!     "water_damage/group/ceiling.json"
//! );
//! ```

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Key of the flat training line-item catalog.
pub const TRAINING_CATALOG: &str = "TrainAllLineItems.json";

/// Key of the top-level damage type index object.
pub const TYPE_INDEX: &str = "damage_type.json";

/// Prefix under which dated backup folders live.
pub const DATED_BACKUP_ROOT: &str = "backup/";

/// Prefix of the single temporary backup slot.
pub const TEMP_BACKUP_ROOT: &str = "temporary_backup/";

/// Marker identifying image-storage keys, which backups skip.
pub const IMAGE_STORAGE_MARKER: &str = "/storage/images/";

const MAX_SEGMENT_LEN: usize = 128;

// ============================================================================
// Validated name segments
// ============================================================================

/// Lowercases, trims, and collapses whitespace runs into underscores.
fn normalize_segment(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn validate_segment(segment: &str, what: &'static str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::InvalidInput(format!("{what} must not be empty")));
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(Error::InvalidInput(format!(
            "{what} must be at most {MAX_SEGMENT_LEN} characters"
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(Error::InvalidInput(format!(
            "{what} may only contain lowercase letters, digits, '_' and '-': {segment}"
        )));
    }
    Ok(())
}

/// A validated, normalized damage type name.
///
/// Construction normalizes the raw input (trim, lowercase, whitespace runs
/// become underscores) and rejects anything that could escape its directory:
/// empty names, separators, traversal sequences, control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DamageType(String);

impl DamageType {
    /// Normalizes and validates a raw damage type name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the normalized name is empty, too
    /// long, or contains characters outside `[a-z0-9_-]`.
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = normalize_segment(raw);
        validate_segment(&normalized, "damage type")?;
        Ok(Self(normalized))
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DamageType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, normalized substitution file name.
///
/// Same normalization and rejection rules as [`DamageType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubstitutionName(String);

impl SubstitutionName {
    /// Normalizes and validates a raw substitution name.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the normalized name is empty, too
    /// long, or contains characters outside `[a-z0-9_-]`.
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = normalize_segment(raw);
        validate_segment(&normalized, "substitution name")?;
        Ok(Self(normalized))
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SubstitutionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubstitutionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of substitution subdirectory a damage type can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstitutionKind {
    /// Items grouped under `subtype/`.
    Subtype,
    /// Items grouped under `group/`.
    Group,
}

impl SubstitutionKind {
    /// All substitution kinds, in directory-listing order.
    pub const ALL: [SubstitutionKind; 2] = [SubstitutionKind::Subtype, SubstitutionKind::Group];

    /// Returns the directory segment for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SubstitutionKind::Subtype => "subtype",
            SubstitutionKind::Group => "group",
        }
    }
}

impl fmt::Display for SubstitutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubstitutionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subtype" => Ok(SubstitutionKind::Subtype),
            "group" => Ok(SubstitutionKind::Group),
            other => Err(Error::InvalidInput(format!(
                "unknown substitution kind: {other}"
            ))),
        }
    }
}

// ============================================================================
// Key construction
// ============================================================================

/// Key of the master file for a damage type.
#[must_use]
pub fn master_file(damage_type: &DamageType) -> String {
    format!("{damage_type}/{damage_type}.json")
}

/// Directory prefix holding everything for a damage type.
#[must_use]
pub fn damage_dir(damage_type: &DamageType) -> String {
    format!("{damage_type}/")
}

/// Key of a substitution file under a damage type.
#[must_use]
pub fn substitution_file(
    damage_type: &DamageType,
    kind: SubstitutionKind,
    name: &SubstitutionName,
) -> String {
    format!("{damage_type}/{kind}/{name}.json")
}

/// Directory prefix for one substitution kind of a damage type.
#[must_use]
pub fn kind_dir(damage_type: &DamageType, kind: SubstitutionKind) -> String {
    format!("{damage_type}/{kind}/")
}

/// Key of a sibling JSON file directly inside a damage type directory.
///
/// Used when a renamed directory still holds a master file under its old
/// name.
#[must_use]
pub fn sibling_file(damage_type: &DamageType, name: &DamageType) -> String {
    format!("{damage_type}/{name}.json")
}

/// Dated backup folder prefix for the given day (`backup/DDMMYYYY/`).
#[must_use]
pub fn dated_backup_prefix(date: NaiveDate) -> String {
    format!("{DATED_BACKUP_ROOT}{}/", date.format("%d%m%Y"))
}

/// Key of an object's copy inside the temporary backup slot.
#[must_use]
pub fn temporary_backup_key(original: &str) -> String {
    format!("{TEMP_BACKUP_ROOT}{original}")
}

/// Recovers the original key from a temporary backup key.
///
/// Returns `None` if the key is not under the temporary backup prefix.
#[must_use]
pub fn original_from_temporary(key: &str) -> Option<&str> {
    key.strip_prefix(TEMP_BACKUP_ROOT)
}
