use super::IdentityProvider;
use crate::domain::VerifiedIdentity;
use relief_errors::{AppError, AppResult};
use std::collections::HashMap;

/// Fixed token table for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, VerifiedIdentity>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, uid: &str, email: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: email.to_string(),
            },
        );
        self
    }

    /// Parses `token:uid:email` entries separated by commas.
    pub fn parse(entries: &str) -> AppResult<Self> {
        entries.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .try_fold(Self::new(), |identity, entry| {
                let mut parts = entry.splitn(3, ':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(token), Some(uid), Some(email))
                        if !token.is_empty() && !uid.is_empty() && !email.is_empty() =>
                    {
                        Ok(identity.with_user(token, uid, email))
                    }
                    _ => Err(AppError::Config(format!(
                        "DEV_TOKENS entry must be token:uid:email, got {entry:?}"
                    ))),
                }
            })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify_token(&self, token: &str) -> AppResult<VerifiedIdentity> {
        self.tokens.get(token).cloned().ok_or(AppError::Unauthorized)
    }

    async fn resolve_email(&self, email: &str) -> AppResult<Option<String>> {
        Ok(self
            .tokens
            .values()
            .find(|identity| identity.email == email)
            .map(|identity| identity.uid.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_and_lookup() {
        let identity =
            StaticIdentity::parse("t1:u1:one@example.org, t2:u2:two@example.org").unwrap();

        let who = identity.verify_token("t2").await.unwrap();
        assert_eq!(who.uid, "u2");
        assert_eq!(
            identity.resolve_email("one@example.org").await.unwrap(),
            Some("u1".to_string())
        );
        assert_eq!(identity.resolve_email("nobody@example.org").await.unwrap(), None);
        assert_eq!(
            identity.verify_token("bogus").await.unwrap_err(),
            AppError::Unauthorized
        );
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert!(StaticIdentity::parse("t1:u1").is_err());
        assert!(StaticIdentity::parse("").unwrap().tokens.is_empty());
    }
}
