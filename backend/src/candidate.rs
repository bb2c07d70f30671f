//! Picks the next card to show a requester.
//!
//! Selection reads at most [`CANDIDATE_WINDOW`] of the newest eligible
//! listings and returns the first one that passes the location filter. A
//! closer listing that falls outside that window is never offered.

use diesel::prelude::*;
use log::debug;
use serde::Serialize;

use crate::error::AppError;
use crate::geo::{haversine_km, Coordinates};
use crate::models::{Intent, Listing, ListingType, NextQuery, User};
use crate::schema::{listings, swipes};
use crate::user::{get_profile, non_blank};

/// Upper bound on rows scanned per request.
pub const CANDIDATE_WINDOW: i64 = 80;

diesel::define_sql_function! {
    /// Lowercases with full Unicode case folding. SQLite's built-in `lower`
    /// only folds ASCII.
    fn unicode_lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Installs the SQL functions candidate queries rely on. Must run on every
/// new connection.
pub(crate) fn register_sql_functions(conn: &mut SqliteConnection) -> QueryResult<()> {
    unicode_lower_utils::register_impl(conn, |text: String| text.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub listing_type: ListingType,
    /// The requester's own intent. Carried for the client; it does not
    /// restrict which listings are offered.
    pub intent: Intent,
    pub category: Option<String>,
    /// Case-insensitive substring of `query_text`.
    pub text: Option<String>,
    pub max_km: Option<f64>,
}

impl CandidateQuery {
    pub fn new(listing_type: ListingType) -> Self {
        Self {
            listing_type,
            intent: Intent::Need,
            category: None,
            text: None,
            max_km: None,
        }
    }

    /// Builds a query from `/match/next` parameters. `listing_type` defaults
    /// to waste and `intent` to need; an unparsable `max_km` is ignored.
    pub fn from_params(params: &NextQuery) -> Result<Self, AppError> {
        let listing_type = match non_blank(params.listing_type.as_deref()) {
            Some(raw) => raw.parse()?,
            None => ListingType::Waste,
        };
        let intent = match non_blank(params.intent.as_deref()) {
            Some(raw) => raw.parse()?,
            None => Intent::Need,
        };
        let max_km = non_blank(params.max_km.as_deref())
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|km| km.is_finite());
        Ok(Self {
            listing_type,
            intent,
            category: non_blank(params.category.as_deref()).map(str::to_string),
            text: non_blank(params.q.as_deref()).map(str::to_lowercase),
            max_km,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub listing: Listing,
    /// Set only when both sides have coordinates.
    pub distance_km: Option<f64>,
}

/// What is known about where the requester is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locality {
    pub coordinates: Option<Coordinates>,
    pub zip: Option<String>,
}

impl Locality {
    pub fn of_user(user: Option<&User>) -> Self {
        match user {
            Some(user) => Self {
                coordinates: Coordinates::from_parts(user.lat, user.lon),
                zip: non_blank(user.zip.as_deref()).map(str::to_string),
            },
            None => Self::default(),
        }
    }
}

/// Returns the next unseen listing for `requester_id`, if any.
///
/// An unknown requester is treated as having no location.
pub fn next_candidate(
    conn: &mut SqliteConnection,
    requester_id: &str,
    query: &CandidateQuery,
) -> Result<Option<Candidate>, AppError> {
    let requester = get_profile(conn, requester_id)?;
    let locality = Locality::of_user(requester.as_ref());
    let window = load_window(conn, requester_id, query)?;
    debug!(
        "Scanning {} {} listings for {}",
        window.len(),
        query.listing_type,
        requester_id
    );
    Ok(pick_first(&locality, window, query.max_km))
}

fn load_window(
    conn: &mut SqliteConnection,
    requester_id: &str,
    query: &CandidateQuery,
) -> Result<Vec<Listing>, AppError> {
    let already_swiped = swipes::table
        .filter(swipes::swiper_user_id.eq(requester_id))
        .select(swipes::listing_id);

    let mut rows = listings::table
        .filter(listings::active.eq(true))
        .filter(listings::owner_user_id.ne(requester_id))
        .filter(listings::listing_type.eq(query.listing_type))
        .filter(listings::id.ne_all(already_swiped))
        .into_boxed();
    if let Some(category) = &query.category {
        rows = rows.filter(listings::category.eq(category.clone()));
    }
    if let Some(text) = &query.text {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        rows = rows.filter(unicode_lower(listings::query_text).like(pattern).escape('\\'));
    }

    let window = rows
        .order((listings::created_at.desc(), listings::id.desc()))
        .limit(CANDIDATE_WINDOW)
        .select(Listing::as_select())
        .load(conn)?;
    Ok(window)
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Returns the first listing in `window` order that passes the location
/// filter.
///
/// With coordinates on both sides the great-circle distance must not exceed
/// `max_km` (when given). Otherwise the zips must be equal, unless the
/// requester has no zip at all.
pub fn pick_first(requester: &Locality, window: Vec<Listing>, max_km: Option<f64>) -> Option<Candidate> {
    window
        .into_iter()
        .find_map(|listing| accept(requester, listing, max_km))
}

fn accept(requester: &Locality, listing: Listing, max_km: Option<f64>) -> Option<Candidate> {
    let there = Coordinates::from_parts(listing.lat, listing.lon);
    if let (Some(here), Some(there)) = (requester.coordinates, there) {
        let distance = haversine_km(here, there);
        if max_km.is_some_and(|max| distance > max) {
            debug!("Skipping listing {}: {:.2} km away", listing.id, distance);
            return None;
        }
        return Some(Candidate {
            listing,
            distance_km: Some(distance),
        });
    }

    match requester.zip.as_deref() {
        Some(zip) if non_blank(listing.zip.as_deref()) != Some(zip) => {
            debug!("Skipping listing {}: zip mismatch", listing.id);
            None
        }
        _ => Some(Candidate {
            listing,
            distance_km: None,
        }),
    }
}
