use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::info;

use crate::error::AppError;
use crate::listing::find_listing;
use crate::matches::evaluate_match;
use crate::models::{Decision, NewSwipe, SwipeOutcome, SwipeRequest};
use crate::schema::swipes;
use crate::user::ensure_user;

/// Validates a `POST /match/swipe` body.
pub fn parse_swipe(request: &SwipeRequest) -> Result<(i32, Decision), AppError> {
    let decision: Decision = request.decision.parse()?;
    let listing_id = request
        .listing_id
        .ok_or_else(|| AppError::validation("listing_id required"))?;
    Ok((listing_id, decision))
}

/// Records `decision` by `swiper_id` on `listing_id`, replacing any earlier
/// decision on the same listing, and runs match detection for a yes.
///
/// Everything happens in one immediate (write-locked) transaction, so two
/// counterparties swiping at the same moment are serialized and the second
/// one sees the first one's swipe.
pub fn record_swipe(
    conn: &mut SqliteConnection,
    swiper_id: &str,
    listing_id: i32,
    decision: Decision,
) -> Result<SwipeOutcome, AppError> {
    let outcome = conn.immediate_transaction::<_, AppError, _>(|conn| {
        let listing = find_listing(conn, listing_id)?
            .ok_or_else(|| AppError::NotFound(format!("listing {listing_id}")))?;
        if listing.owner_user_id == swiper_id {
            return Err(AppError::validation("cannot swipe on your own listing"));
        }

        ensure_user(conn, swiper_id)?;
        diesel::insert_into(swipes::table)
            .values(&NewSwipe {
                swiper_user_id: swiper_id,
                listing_id,
                decision,
                created_at: Utc::now().naive_utc(),
            })
            .on_conflict((swipes::swiper_user_id, swipes::listing_id))
            .do_update()
            .set((
                swipes::decision.eq(excluded(swipes::decision)),
                swipes::created_at.eq(excluded(swipes::created_at)),
            ))
            .execute(conn)?;

        match decision {
            Decision::Yes => evaluate_match(conn, swiper_id, &listing),
            Decision::No => Ok(SwipeOutcome::unmatched()),
        }
    })?;
    info!(
        "User {} swiped {} on listing {} (matched: {})",
        swiper_id, decision, listing_id, outcome.matched
    );
    Ok(outcome)
}
