mod google_identity;
mod static_identity;

pub use google_identity::{GoogleIdentity, GoogleUserInfo, GOOGLE_USERINFO_URL};
pub use static_identity::StaticIdentity;

use crate::domain::VerifiedIdentity;
use relief_errors::AppResult;

/// External identity provider: proves who holds a bearer token and maps
/// emails to user ids.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fails with `Unauthorized` for tokens the provider rejects.
    async fn verify_token(&self, token: &str) -> AppResult<VerifiedIdentity>;

    async fn resolve_email(&self, email: &str) -> AppResult<Option<String>>;
}
