pub mod extractors;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use relief_app::infrastructure::store::StationStore;
use relief_app::AppContext;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

fn api_routes<S: StationStore>() -> Router<AppContext<S>> {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/stations",
            get(routes::list_stations::<S>).post(routes::create_station::<S>),
        )
        .route(
            "/stations/{id}",
            get(routes::get_station::<S>)
                .put(routes::update_station::<S>)
                .delete(routes::delete_station::<S>),
        )
        .route("/stations/{id}/vote", post(routes::cast_vote::<S>))
        .route(
            "/stations/{id}/users",
            get(routes::station_members::<S>)
                .post(routes::add_member::<S>)
                .delete(routes::remove_member::<S>),
        )
        .route("/votes/user/{user_id}", get(routes::user_votes::<S>))
        .route(
            "/votes/{user_id}/{station_id}",
            get(routes::user_vote::<S>),
        )
        .route("/roles/self-update", post(routes::self_update_role::<S>))
        .route(
            "/roles/self-claim-volunteer",
            post(routes::self_claim_volunteer::<S>),
        )
        .route(
            "/roles/{user_id}",
            get(routes::get_role::<S>).put(routes::set_role::<S>),
        )
}

/// Full application router, served both at `/` and under `/api`.
pub fn router<S: StationStore>(ctx: AppContext<S>) -> Router {
    let api = api_routes::<S>();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
