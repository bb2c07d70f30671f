use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use log::info;

use crate::error::AppError;
use crate::models::{Decision, Listing, Match, MatchDetails, NewMatch, SwipeOutcome};
use crate::schema::{listings, matches, swipes};

/// Most matches returned by [`list_matches`].
pub const MATCH_LIST_LIMIT: i64 = 50;

/// Orders two listing ids as (smaller, larger), the natural key of a match.
pub fn canonical_pair(x: i32, y: i32) -> (i32, i32) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Called after `swiper_id` said yes to `liked`. Matches when the owner of
/// `liked` has already said yes to some listing owned by `swiper_id`.
///
/// The pair insert ignores an existing row, so repeated or racing calls for
/// the same two listings all report the one stored match.
pub fn evaluate_match(
    conn: &mut SqliteConnection,
    swiper_id: &str,
    liked: &Listing,
) -> Result<SwipeOutcome, AppError> {
    let reciprocated: Option<i32> = swipes::table
        .inner_join(listings::table)
        .filter(swipes::swiper_user_id.eq(&liked.owner_user_id))
        .filter(swipes::decision.eq(Decision::Yes))
        .filter(listings::owner_user_id.eq(swiper_id))
        .order(listings::id.asc())
        .select(listings::id)
        .first(conn)
        .optional()?;
    let Some(other_id) = reciprocated else {
        return Ok(SwipeOutcome::unmatched());
    };

    let (listing_a_id, listing_b_id) = canonical_pair(liked.id, other_id);
    let inserted = diesel::insert_into(matches::table)
        .values(&NewMatch {
            listing_a_id,
            listing_b_id,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict((matches::listing_a_id, matches::listing_b_id))
        .do_nothing()
        .execute(conn)?;
    let match_id: i32 = matches::table
        .filter(matches::listing_a_id.eq(listing_a_id))
        .filter(matches::listing_b_id.eq(listing_b_id))
        .select(matches::id)
        .first(conn)?;
    if inserted > 0 {
        info!(
            "Created match {} between listings {} and {}",
            match_id, listing_a_id, listing_b_id
        );
    }
    Ok(SwipeOutcome::matched(match_id))
}

/// Matches involving any listing owned by `user_id`, newest first.
pub fn list_matches(conn: &mut SqliteConnection, user_id: &str) -> Result<Vec<MatchDetails>, AppError> {
    let owned_a = listings::table
        .filter(listings::owner_user_id.eq(user_id))
        .select(listings::id);
    let owned_b = listings::table
        .filter(listings::owner_user_id.eq(user_id))
        .select(listings::id);
    let rows: Vec<Match> = matches::table
        .filter(
            matches::listing_a_id
                .eq_any(owned_a)
                .or(matches::listing_b_id.eq_any(owned_b)),
        )
        .order((matches::created_at.desc(), matches::id.desc()))
        .limit(MATCH_LIST_LIMIT)
        .select(Match::as_select())
        .load(conn)?;

    let ids: Vec<i32> = rows
        .iter()
        .flat_map(|m| [m.listing_a_id, m.listing_b_id])
        .collect();
    let by_id: HashMap<i32, Listing> = listings::table
        .filter(listings::id.eq_any(ids))
        .select(Listing::as_select())
        .load(conn)?
        .into_iter()
        .map(|listing| (listing.id, listing))
        .collect();

    let details = rows
        .into_iter()
        .filter_map(|m| {
            let listing_a = by_id.get(&m.listing_a_id)?.clone();
            let listing_b = by_id.get(&m.listing_b_id)?.clone();
            Some(MatchDetails {
                match_id: m.id,
                created_at: m.created_at,
                listing_a,
                listing_b,
            })
        })
        .collect();
    Ok(details)
}
