use crate::extractors::{AuthUser, JsonBody};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use relief_app::domain::{
    MemberRole, NewStation, StationUpdate, UserRole, VoteRequest, VoteType,
};
use relief_app::infrastructure::security::InputValidator;
use relief_app::infrastructure::store::StationStore;
use relief_app::AppContext;
use relief_errors::{AppError, AppResult};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    user_id: Option<String>,
    vote_type: Option<String>,
    user_role: Option<String>,
}

#[derive(Deserialize)]
pub struct MemberBody {
    email: Option<String>,
    role: Option<String>,
}

#[derive(Deserialize)]
pub struct RoleBody {
    role: Option<String>,
}

fn parse_role(value: Option<&str>) -> AppResult<UserRole> {
    value
        .ok_or_else(|| AppError::Validation("role is required".to_string()))?
        .parse::<UserRole>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn parse_member_body(body: MemberBody) -> AppResult<(String, MemberRole)> {
    let (Some(email), Some(role)) = (body.email, body.role) else {
        return Err(AppError::Validation(
            "Valid email and role are required".to_string(),
        ));
    };
    let email = InputValidator::validate_email(&email)?;
    let role = role
        .parse::<MemberRole>()
        .map_err(AppError::Validation)?;
    Ok((email, role))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn list_stations<S: StationStore>(
    State(ctx): State<AppContext<S>>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ctx.stations.list().await?))
}

pub async fn get_station<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ctx.stations.get(&id).await?))
}

pub async fn create_station<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    AuthUser(actor): AuthUser,
    JsonBody(input): JsonBody<NewStation>,
) -> AppResult<impl IntoResponse> {
    let station = ctx.stations.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

pub async fn update_station<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(id): Path<String>,
    AuthUser(actor): AuthUser,
    JsonBody(changes): JsonBody<StationUpdate>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ctx.stations.update(&actor, &id, changes).await?))
}

pub async fn delete_station<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(id): Path<String>,
    AuthUser(actor): AuthUser,
) -> AppResult<impl IntoResponse> {
    ctx.stations.delete(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cast_vote<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(station_id): Path<String>,
    JsonBody(body): JsonBody<VoteBody>,
) -> AppResult<impl IntoResponse> {
    let user_id = InputValidator::validate_id("userId", body.user_id.as_deref().unwrap_or(""))?;
    let vote_type = body
        .vote_type
        .as_deref()
        .ok_or_else(|| AppError::Validation("voteType is required".to_string()))?
        .parse::<VoteType>()
        .map_err(AppError::Validation)?;
    // The claimed role is trusted as sent; see DESIGN.md.
    let user_role = parse_role(body.user_role.as_deref())?;

    ctx.vote_limiter.check_rate_limit(&user_id)?;

    let result = ctx
        .cast_vote
        .execute(
            &station_id,
            &VoteRequest {
                user_id,
                vote_type,
                user_role,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "upvotes": result.upvotes,
        "downvotes": result.downvotes,
        "voteType": result.vote_type,
        "isVerified": result.is_verified,
    })))
}

pub async fn station_members<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ctx.stations.members(&id).await?))
}

pub async fn add_member<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(station_id): Path<String>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<MemberBody>,
) -> AppResult<impl IntoResponse> {
    let (email, role) = parse_member_body(body)?;
    let change = ctx
        .manage_members
        .add_member(&station_id, &actor, &email, role)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("User {email} added as {role} to station {station_id}"),
        "newRole": change.new_role,
    })))
}

pub async fn remove_member<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(station_id): Path<String>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<MemberBody>,
) -> AppResult<impl IntoResponse> {
    let (email, role) = parse_member_body(body)?;
    let change = ctx
        .manage_members
        .remove_member(&station_id, &actor, &email, role)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("User {email} removed from {role}s of station {station_id}"),
        "newRole": change.new_role,
    })))
}

pub async fn user_vote<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path((user_id, station_id)): Path<(String, String)>,
    AuthUser(actor): AuthUser,
) -> AppResult<impl IntoResponse> {
    let vote = ctx.stations.vote_of(&actor, &user_id, &station_id).await?;
    Ok(Json(json!({ "voteType": vote })))
}

pub async fn user_votes<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(user_id): Path<String>,
    AuthUser(actor): AuthUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(ctx.stations.votes_of(&actor, &user_id).await?))
}

pub async fn get_role<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(user_id): Path<String>,
    AuthUser(actor): AuthUser,
) -> AppResult<impl IntoResponse> {
    let role = ctx.roles.role_of(&actor, &user_id).await?;
    Ok(Json(json!({ "role": role })))
}

pub async fn set_role<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    Path(user_id): Path<String>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<RoleBody>,
) -> AppResult<impl IntoResponse> {
    let role = parse_role(body.role.as_deref())?;
    ctx.roles.set_role(&actor, &user_id, role).await?;
    Ok(Json(json!({ "message": "User role updated successfully" })))
}

pub async fn self_update_role<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    AuthUser(actor): AuthUser,
    JsonBody(body): JsonBody<RoleBody>,
) -> AppResult<impl IntoResponse> {
    let role = parse_role(body.role.as_deref())?;
    let role = ctx.roles.self_update(&actor, role).await?;
    Ok(Json(json!({ "message": "User role updated successfully", "role": role })))
}

pub async fn self_claim_volunteer<S: StationStore>(
    State(ctx): State<AppContext<S>>,
    AuthUser(actor): AuthUser,
) -> AppResult<impl IntoResponse> {
    let role = ctx.roles.self_update(&actor, UserRole::Volunteer).await?;
    Ok(Json(json!({
        "message": "User role updated to VOLUNTEER successfully",
        "role": role,
    })))
}
