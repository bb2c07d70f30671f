use chrono::Utc;
use diesel::prelude::*;
use log::info;

use crate::error::AppError;
use crate::geo;
use crate::models::{Intent, Listing, ListingRequest, ListingType, NewListing};
use crate::schema::listings;
use crate::user::{ensure_user, non_blank};

/// Checks a listing request and normalises it into an insertable row.
pub fn validate_listing(owner_id: &str, request: &ListingRequest) -> Result<NewListing, AppError> {
    let listing_type: ListingType = request.listing_type.parse()?;
    let intent: Intent = request.intent.parse()?;
    let category = request.category.trim();
    let query_text = request.query_text.trim();
    if category.is_empty() || query_text.is_empty() {
        return Err(AppError::validation("category and query_text are required"));
    }
    if let Some(price) = request.price {
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::validation("price must be a non-negative number"));
        }
    }
    geo::validate(request.lat, request.lon).map_err(AppError::Validation)?;

    Ok(NewListing {
        owner_user_id: owner_id.to_string(),
        listing_type,
        intent,
        category: category.to_string(),
        query_text: query_text.to_string(),
        condition: non_blank(request.condition.as_deref()).map(str::to_string),
        price: request.price,
        zip: non_blank(request.zip.as_deref()).map(str::to_string),
        lat: request.lat,
        lon: request.lon,
        active: true,
        created_at: Utc::now().naive_utc(),
    })
}

/// Validates and stores a new listing owned by `owner_id`.
pub fn create_listing(
    conn: &mut SqliteConnection,
    owner_id: &str,
    request: &ListingRequest,
) -> Result<Listing, AppError> {
    let new_listing = validate_listing(owner_id, request)?;
    let listing = conn.transaction::<_, AppError, _>(|conn| {
        ensure_user(conn, owner_id)?;
        let listing = diesel::insert_into(listings::table)
            .values(&new_listing)
            .returning(Listing::as_returning())
            .get_result(conn)?;
        Ok(listing)
    })?;
    info!(
        "Created listing {} ({}/{}) for user {}",
        listing.id, listing.listing_type, listing.intent, owner_id
    );
    Ok(listing)
}

pub fn find_listing(conn: &mut SqliteConnection, listing_id: i32) -> Result<Option<Listing>, AppError> {
    let listing = listings::table
        .find(listing_id)
        .select(Listing::as_select())
        .first(conn)
        .optional()?;
    Ok(listing)
}

/// Active listings owned by anyone but `user_id`, newest first.
pub fn listings_of_others(conn: &mut SqliteConnection, user_id: &str) -> Result<Vec<Listing>, AppError> {
    let rows = listings::table
        .filter(listings::active.eq(true))
        .filter(listings::owner_user_id.ne(user_id))
        .order((listings::created_at.desc(), listings::id.desc()))
        .select(Listing::as_select())
        .load(conn)?;
    Ok(rows)
}
