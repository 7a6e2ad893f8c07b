//! Profile store access.
//!
//! Profiles live as `profile_<name>.json` files in the profiles directory
//! and are re-read on every application, so operator edits take effect
//! without a controller restart. The store is read-only from the
//! controller's perspective.

use hp_common::profile::{profile_file_name, ProfileDefinition};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::sha256_hex;

/// Errors from profile resolution.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile {name:?} not found at {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("invalid JSON in profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A profile definition resolved from the store, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    /// Catalog name.
    pub name: String,
    /// Definition file path.
    pub path: PathBuf,
    /// SHA-256 of the definition file content.
    pub sha256: String,
    /// The parsed definition.
    pub definition: ProfileDefinition,
}

/// Resolve `name` against the profile store.
pub fn load_profile(profiles_dir: &Path, name: &str) -> Result<LoadedProfile, ProfileError> {
    let path = profiles_dir.join(profile_file_name(name));
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProfileError::NotFound {
                name: name.to_string(),
                path,
            })
        }
        Err(source) => return Err(ProfileError::Io { path, source }),
    };
    let definition: ProfileDefinition =
        serde_json::from_str(&content).map_err(|source| ProfileError::Parse {
            path: path.clone(),
            source,
        })?;
    Ok(LoadedProfile {
        name: name.to_string(),
        path,
        sha256: sha256_hex(content.as_bytes()),
        definition,
    })
}
