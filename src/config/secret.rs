//! Connection strings held as secrets
//!
//! Database URLs carry passwords. They are wrapped in [`secrecy::Secret`] so
//! they never show up in `Debug` output and are zeroed when dropped. Code that
//! needs the value calls `expose_secret()`; code that logs it uses
//! [`crate::adapters::postgresql::client::redact_connection_string`].
//!
//! ```rust
//! use splitstore::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let url = secret_string("postgresql://svc:pw@db/pii".to_string());
//! assert!(url.expose_secret().as_ref().starts_with("postgresql://"));
//! assert!(!format!("{url:?}").contains("pw"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
#[derive(Clone, Debug, Zeroize)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if the value starts with any of the given schemes
    pub fn has_scheme(&self, schemes: &[&str]) -> bool {
        schemes.iter().any(|s| self.0.starts_with(s))
    }

    /// Parse the value into another type
    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A connection string that is redacted in debug output and zeroed on drop
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("postgresql://u:pw@h/db".to_string());
        assert_eq!(secret.expose_secret(), "postgresql://u:pw@h/db");
        assert!(secret.expose_secret().has_scheme(&["postgres://", "postgresql://"]));
        assert!(!secret.expose_secret().has_scheme(&["mysql://"]));
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("postgresql://u:hunter2@h/db".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            connection_string: SecretString,
        }

        let section: Section =
            toml::from_str(r#"connection_string = "postgresql://u:p@h/db""#).unwrap();
        assert_eq!(
            section.connection_string.expose_secret(),
            "postgresql://u:p@h/db"
        );
    }
}
