use chrono::Utc;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sqlite::SqliteConnection;
use tempfile::TempDir;

use crate::db::{establish_pool, run_migrations, DbPool};
use crate::models::{Intent, Listing, ListingRequest, ListingType};

/// A migrated SQLite database in a temporary directory.
pub struct TestDb {
    _dir: TempDir,
    pub pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = establish_pool(path.to_str().unwrap(), 4).unwrap();
        run_migrations(&pool).unwrap();
        Self { _dir: dir, pool }
    }

    pub fn conn(&self) -> PooledConnection<ConnectionManager<SqliteConnection>> {
        self.pool.get().unwrap()
    }
}

pub fn listing_request(listing_type: &str, intent: &str, category: &str, query_text: &str) -> ListingRequest {
    ListingRequest {
        listing_type: listing_type.into(),
        intent: intent.into(),
        category: category.into(),
        query_text: query_text.into(),
        ..Default::default()
    }
}

/// An unsaved listing with no location, for pure filter tests.
pub fn sample_listing(id: i32) -> Listing {
    Listing {
        id,
        owner_user_id: "owner".into(),
        listing_type: ListingType::Waste,
        intent: Intent::Offer,
        category: "paper".into(),
        query_text: "cardboard".into(),
        condition: None,
        price: None,
        zip: None,
        lat: None,
        lon: None,
        active: true,
        created_at: Utc::now().naive_utc(),
    }
}
