use crate::domain::{LedgerEffect, VoteRecord, VoteRequest, VoteResult, VoteTransition};
use crate::infrastructure::store::{StationStore, StoreTx};
use relief_errors::{AppError, AppResult};

/// Casts, flips or retracts a user's vote on a station and updates the
/// station tally in the same transaction.
pub struct CastVote<S> {
    store: S,
}

impl<S: StationStore> CastVote<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn execute(&self, station_id: &str, request: &VoteRequest) -> AppResult<VoteResult> {
        let mut tx = self.store.begin().await?;

        let mut station = tx
            .station_for_update(station_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station {station_id}")))?;
        let previous = tx.vote_for_update(&request.user_id, station_id).await?;

        let transition = VoteTransition::compute(
            previous.as_ref().map(|v| (v.vote_type, v.user_role)),
            request.vote_type,
            request.user_role,
        );
        let now = chrono::Utc::now();

        match (transition.effect, previous) {
            (LedgerEffect::Create(vote_type), _) => {
                let record = VoteRecord::new(
                    request.user_id.as_str(),
                    station_id,
                    vote_type,
                    request.user_role,
                    now,
                );
                tx.put_vote(&record).await?;
            }
            (LedgerEffect::Update(vote_type), Some(mut record)) => {
                record.vote_type = vote_type;
                record.updated_at = Some(now);
                tx.put_vote(&record).await?;
            }
            (LedgerEffect::Update(_), None) => {
                return Err(AppError::Internal(
                    "vote flip computed without a standing vote".to_string(),
                ));
            }
            (LedgerEffect::Delete, _) => {
                tx.delete_vote(&request.user_id, station_id).await?;
            }
        }

        station.apply_vote_deltas(transition.upvote_delta, transition.downvote_delta);
        let stamped = request.vote_type == crate::domain::VoteType::Up
            && station.stamp_verification(request.user_role, now);

        tx.save_station(&station).await?;
        tx.commit().await?;

        tracing::debug!(
            station_id,
            user_id = %request.user_id,
            claimed_role = %request.user_role,
            up = transition.upvote_delta,
            down = transition.downvote_delta,
            stamped,
            "Vote applied"
        );

        Ok(VoteResult {
            upvotes: station.upvotes,
            downvotes: station.downvotes,
            vote_type: transition.resulting_vote(),
            is_verified: station.is_verified(),
        })
    }
}
