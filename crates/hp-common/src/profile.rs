//! Deception profile definitions.
//!
//! A profile is a named bundle of deception artifacts authored by operators
//! offline: an SSH banner, a credential database, and a set of decoy files
//! to seed into the emulated filesystem. Definitions are immutable once
//! loaded; the actuator re-reads them from disk on every application so
//! operator edits take effect without a controller restart.

use serde::{Deserialize, Serialize};

/// On-disk definition of one deception profile.
///
/// All fields are optional: a profile that only changes the banner simply
/// omits `users` and `fake_files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    /// Pre-login banner text presented to connecting clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Credential entries in `login:x:secret` form, in presentation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Decoy file names to create under the emulated home directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fake_files: Vec<String>,
}

impl ProfileDefinition {
    /// Whether this profile defines no artifacts at all.
    pub fn is_empty(&self) -> bool {
        self.banner.as_deref().map_or(true, str::is_empty)
            && self.users.is_empty()
            && self.fake_files.is_empty()
    }
}

/// File name holding the definition for `name`.
pub fn profile_file_name(name: &str) -> String {
    format!("profile_{}.json", name)
}
