use super::IdentityProvider;
use crate::domain::VerifiedIdentity;
use crate::infrastructure::store::StationStore;
use relief_errors::{AppError, AppResult};
use serde::Deserialize;

pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String, // Google's unique user ID
    pub email: Option<String>,
    pub email_verified: Option<bool>,
}

/// Verifies Google access tokens against the OIDC userinfo endpoint.
///
/// Google offers no email lookup for arbitrary accounts, so emails resolve
/// through the users registered in the store on their first sign-in.
#[derive(Clone)]
pub struct GoogleIdentity<S> {
    http_client: reqwest::Client,
    userinfo_url: String,
    store: S,
}

impl<S: StationStore> GoogleIdentity<S> {
    pub fn new(userinfo_url: impl Into<String>, store: S) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            userinfo_url: userinfo_url.into(),
            store,
        }
    }
}

#[async_trait::async_trait]
impl<S: StationStore> IdentityProvider for GoogleIdentity<S> {
    async fn verify_token(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Failed to fetch user info: {}", e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AppError::Unauthorized);
        }

        let info = response
            .error_for_status()
            .map_err(|e| AppError::Identity(e.to_string()))?
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| AppError::Identity(format!("Failed to parse user info: {}", e)))?;

        match (info.email, info.email_verified) {
            (Some(email), Some(true)) => Ok(VerifiedIdentity {
                uid: info.sub,
                email,
            }),
            _ => {
                tracing::warn!(uid = %info.sub, "Token has no verified email");
                Err(AppError::Unauthorized)
            }
        }
    }

    async fn resolve_email(&self, email: &str) -> AppResult<Option<String>> {
        Ok(self.store.find_user_by_email(email).await?.map(|u| u.id))
    }
}
