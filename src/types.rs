//! Type-safe enums shared across iminstall
//!
//! Installer options are modelled as enums rather than strings so that the
//! values handed to `imcl` are checked when settings are parsed.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Access rights mode passed to `imcl -accessRights`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum AccessMode {
    #[default]
    #[strum(serialize = "admin")]
    Admin,
    #[strum(serialize = "nonAdmin")]
    NonAdmin,
    /// Group mode; `im_group` is accepted for older settings files
    #[serde(alias = "im_group")]
    #[strum(to_string = "group", serialize = "im_group")]
    Group,
}

impl AccessMode {
    /// Umask the installer must run with, if any.
    ///
    /// Group mode needs group read/write on files the installer creates,
    /// otherwise it cannot lock its own configuration area.
    pub fn umask_override(&self) -> Option<u32> {
        match self {
            AccessMode::Group => Some(0o013),
            AccessMode::Admin | AccessMode::NonAdmin => None,
        }
    }
}

/// Severity of an operator-facing advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warn,
}

/// How the credential advisory and the installer flags relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CredentialPolicy {
    /// One decision drives both the message and the flags
    #[default]
    Unified,
    /// Advisory table and command-line fallback are computed separately
    Legacy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_access_mode_strings() {
        assert_eq!(AccessMode::Admin.to_string(), "admin");
        assert_eq!(AccessMode::NonAdmin.to_string(), "nonAdmin");
        assert_eq!(AccessMode::Group.to_string(), "group");
        assert_eq!("im_group".parse::<AccessMode>().unwrap(), AccessMode::Group);
        assert_eq!("nonAdmin".parse::<AccessMode>().unwrap(), AccessMode::NonAdmin);
        assert!("root".parse::<AccessMode>().is_err());
    }

    #[test]
    fn test_access_mode_serde_alias() {
        let mode: AccessMode = serde_json::from_str("\"im_group\"").unwrap();
        assert_eq!(mode, AccessMode::Group);
        assert_eq!(serde_json::to_string(&AccessMode::NonAdmin).unwrap(), "\"nonAdmin\"");
    }

    #[test]
    fn test_only_group_mode_overrides_umask() {
        for mode in AccessMode::iter() {
            match mode {
                AccessMode::Group => assert_eq!(mode.umask_override(), Some(0o013)),
                _ => assert_eq!(mode.umask_override(), None),
            }
        }
    }

    #[test]
    fn test_policy_roundtrip() {
        for policy in CredentialPolicy::iter() {
            let parsed: CredentialPolicy = policy.to_string().parse().unwrap();
            assert_eq!(parsed, policy);
        }
    }
}
