use crate::application::{CastVote, ManageMembers, RoleManagement, StationCatalog};
use crate::config::AppConfig;
use crate::infrastructure::auth::IdentityProvider;
use crate::infrastructure::security::RateLimiter;
use crate::infrastructure::store::StationStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext<S> {
    pub identity: Arc<dyn IdentityProvider>,
    pub cast_vote: Arc<CastVote<S>>,
    pub manage_members: Arc<ManageMembers<S>>,
    pub stations: Arc<StationCatalog<S>>,
    pub roles: Arc<RoleManagement<S>>,
    pub vote_limiter: RateLimiter,
}

impl<S: StationStore> AppContext<S> {
    pub fn new(store: S, identity: Arc<dyn IdentityProvider>, config: &AppConfig) -> Self {
        Self {
            cast_vote: Arc::new(CastVote::new(store.clone())),
            manage_members: Arc::new(ManageMembers::new(store.clone(), identity.clone())),
            stations: Arc::new(StationCatalog::new(store.clone())),
            roles: Arc::new(RoleManagement::new(
                store,
                config.bootstrap_admins.iter().cloned(),
            )),
            identity,
            vote_limiter: RateLimiter::new(config.vote_limits),
        }
    }
}
