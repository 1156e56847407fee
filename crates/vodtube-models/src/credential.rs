//! Remote host credential.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth-style access/refresh token pair for the remote video host.
///
/// There is at most one active credential set per deployment.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoteCredential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expiry: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl RemoteCredential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expiry,
            updated_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    /// True if the token expires within `margin` from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expiry
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            "Bearer"
        } else {
            &self.token_type
        };
        format!("{} {}", token_type, self.access_token)
    }
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_margin() {
        let cred = RemoteCredential::new("a", "r", Utc::now() + Duration::seconds(30));
        assert!(!cred.is_expired());
        assert!(cred.expires_within(Duration::seconds(60)));
    }

    #[test]
    fn test_authorization_header() {
        let mut cred = RemoteCredential::new("tok", "r", Utc::now());
        assert_eq!(cred.authorization(), "Bearer tok");
        cred.token_type = String::new();
        assert_eq!(cred.authorization(), "Bearer tok");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = RemoteCredential::new("secret-access", "secret-refresh", Utc::now());
        let out = format!("{:?}", cred);
        assert!(!out.contains("secret"));
    }

    #[test]
    fn test_token_type_defaults_to_bearer() {
        let json = r#"{"access_token":"a","refresh_token":"r","expiry":"2030-01-01T00:00:00Z"}"#;
        let cred: RemoteCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.token_type, "Bearer");
    }
}
