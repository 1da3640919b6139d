mod cast_vote;
mod manage_members;
mod role_management;
mod station_catalog;

pub use cast_vote::CastVote;
pub use manage_members::{ManageMembers, MembershipChange};
pub use role_management::RoleManagement;
pub use station_catalog::StationCatalog;

use crate::domain::{Actor, Station, UserRole};
use relief_errors::{AppError, AppResult};

/// Only admins and station managers act on a station, and a manager only
/// on a station that lists them.
pub(crate) fn ensure_can_manage(actor: &Actor, station: &Station) -> AppResult<()> {
    ensure_manager_role(actor)?;
    if !actor.is_admin() && !station.is_manager(&actor.email) {
        return Err(AppError::Forbidden(
            "not a manager of this station".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_manager_role(actor: &Actor) -> AppResult<()> {
    if !matches!(actor.role, UserRole::Admin | UserRole::StationManager) {
        return Err(AppError::Forbidden(
            "only admins or station managers can do this".to_string(),
        ));
    }
    Ok(())
}
