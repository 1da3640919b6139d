use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::{header::AUTHORIZATION, request::Parts};
use axum::Json;
use relief_app::domain::Actor;
use relief_app::infrastructure::store::StationStore;
use relief_app::AppContext;
use relief_errors::AppError;

/// Caller proven by the `Authorization: Bearer` header, with their stored role.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

impl<S: StationStore> FromRequestParts<AppContext<S>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let identity = ctx.identity.verify_token(&token).await?;
        let actor = ctx.roles.authenticate(identity).await?;
        Ok(AuthUser(actor))
    }
}

/// JSON body whose parse failures surface as `Validation` errors.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(|rejection| AppError::Validation(rejection.body_text()))
    }
}
