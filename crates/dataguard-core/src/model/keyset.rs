use std::collections::HashSet;

use crate::errors::{GuardError, Result};

/// Whether `key` can name a dataset. Keys double as file names in the
/// file-backed primary store, so only `[A-Za-z0-9_.-]` is allowed and a
/// leading dot is rejected.
pub fn is_safe_dataset_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Fixed, deployment-declared set of protected dataset names
///
/// Membership decides both inclusion in snapshots and deletion guarding.
/// Names keep their declared order, which is also the order datasets are read
/// during a snapshot pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedKeySet {
    keys: Vec<String>,
}

impl ProtectedKeySet {
    /// Build a key set, rejecting empty sets, unsafe names, and duplicates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when validation fails.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(GuardError::InvalidConfig {
                reason: "protected_keys must name at least one dataset".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for key in &keys {
            if key.trim().is_empty() {
                return Err(GuardError::InvalidConfig {
                    reason: "protected_keys contains a blank name".to_string(),
                }
                .into());
            }
            if !is_safe_dataset_key(key) {
                return Err(GuardError::InvalidConfig {
                    reason: format!(
                        "protected key '{}' may only use letters, digits, '_', '-' and '.'",
                        key
                    ),
                }
                .into());
            }
            if !seen.insert(key.as_str()) {
                return Err(GuardError::InvalidConfig {
                    reason: format!("protected key '{}' declared twice", key),
                }
                .into());
            }
        }

        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_membership_and_order() {
        let keys = ProtectedKeySet::new(["users", "transactions", "settings"]).unwrap();
        assert!(keys.contains("users"));
        assert!(!keys.contains("session"));
        assert_eq!(
            keys.iter().collect::<Vec<_>>(),
            vec!["users", "transactions", "settings"]
        );
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        let empty = ProtectedKeySet::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(empty.kind(), ExErrorKind::InvalidConfig);

        let dup = ProtectedKeySet::new(["users", "users"]).unwrap_err();
        assert!(dup.message().contains("declared twice"));

        assert!(ProtectedKeySet::new(["  "]).is_err());
    }

    #[test]
    fn test_rejects_names_unusable_as_files() {
        for bad in ["a/b", "../users", ".hidden", "users\\backup", "user list"] {
            let err = ProtectedKeySet::new(["users", bad]).unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidConfig, "{}", bad);
            assert!(err.message().contains(bad), "{}", bad);
        }
        assert!(ProtectedKeySet::new(["user_prefs", "tx-log", "v2.settings"]).is_ok());
    }
}
