use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::info;

use crate::error::AppError;
use crate::geo;
use crate::models::{NewUser, ProfileRequest, User};
use crate::schema::users;

/// An identity vouched for by the external login exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub subject: String,
    pub email: String,
    pub display_name: String,
}

/// Creates the user row on first contact. Existing rows are left untouched.
pub fn ensure_user(conn: &mut SqliteConnection, user_id: &str) -> Result<(), AppError> {
    let inserted = diesel::insert_into(users::table)
        .values(&NewUser {
            id: user_id,
            display_name: None,
            email: None,
            zip: None,
            lat: None,
            lon: None,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict(users::id)
        .do_nothing()
        .execute(conn)?;
    if inserted > 0 {
        info!("Created user {}", user_id);
    }
    Ok(())
}

pub fn get_profile(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<User>, AppError> {
    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

/// Saves display name, zip and coordinates. Blank strings clear a field.
pub fn upsert_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
    profile: &ProfileRequest,
) -> Result<User, AppError> {
    geo::validate(profile.lat, profile.lon).map_err(AppError::Validation)?;
    let display_name = non_blank(profile.display_name.as_deref());
    let zip = non_blank(profile.zip.as_deref());

    let user = diesel::insert_into(users::table)
        .values(&NewUser {
            id: user_id,
            display_name,
            email: None,
            zip,
            lat: profile.lat,
            lon: profile.lon,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict(users::id)
        .do_update()
        .set((
            users::display_name.eq(excluded(users::display_name)),
            users::zip.eq(excluded(users::zip)),
            users::lat.eq(excluded(users::lat)),
            users::lon.eq(excluded(users::lon)),
        ))
        .returning(User::as_returning())
        .get_result(conn)?;
    info!("Saved profile for user {}", user_id);
    Ok(user)
}

/// Upserts the user keyed by the provider's stable subject. Earlier anonymous
/// history under a different id is not merged.
pub fn upsert_external_identity(
    conn: &mut SqliteConnection,
    identity: &ExternalIdentity,
) -> Result<User, AppError> {
    let user = diesel::insert_into(users::table)
        .values(&NewUser {
            id: &identity.subject,
            display_name: Some(&identity.display_name),
            email: Some(&identity.email),
            zip: None,
            lat: None,
            lon: None,
            created_at: Utc::now().naive_utc(),
        })
        .on_conflict(users::id)
        .do_update()
        .set((
            users::display_name.eq(excluded(users::display_name)),
            users::email.eq(excluded(users::email)),
        ))
        .returning(User::as_returning())
        .get_result(conn)?;
    info!("Signed in user {}", identity.subject);
    Ok(user)
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;

    #[test]
    fn ensure_user_is_idempotent() {
        let db = TestDb::new();
        let mut conn = db.conn();
        ensure_user(&mut conn, "u1").unwrap();
        let first = get_profile(&mut conn, "u1").unwrap().unwrap();
        ensure_user(&mut conn, "u1").unwrap();
        let second = get_profile(&mut conn, "u1").unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_user_has_no_profile() {
        let db = TestDb::new();
        assert!(get_profile(&mut db.conn(), "ghost").unwrap().is_none());
    }

    #[test]
    fn profile_upsert_overwrites_location_fields() {
        let db = TestDb::new();
        let mut conn = db.conn();
        upsert_profile(
            &mut conn,
            "u1",
            &ProfileRequest {
                display_name: Some(" Ada ".into()),
                zip: Some("10001".into()),
                lat: Some(40.0),
                lon: Some(-73.0),
            },
        )
        .unwrap();
        let user = upsert_profile(
            &mut conn,
            "u1",
            &ProfileRequest {
                display_name: Some("Ada".into()),
                zip: Some("  ".into()),
                lat: None,
                lon: None,
            },
        )
        .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
        assert_eq!(user.zip, None);
        assert_eq!(user.lat, None);
    }

    #[test]
    fn profile_upsert_rejects_bad_coordinates() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let err = upsert_profile(
            &mut conn,
            "u1",
            &ProfileRequest {
                lat: Some(123.0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(get_profile(&mut conn, "u1").unwrap().is_none());
    }

    #[test]
    fn external_identity_keeps_profile_location() {
        let db = TestDb::new();
        let mut conn = db.conn();
        upsert_profile(
            &mut conn,
            "google-42",
            &ProfileRequest {
                zip: Some("94110".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let user = upsert_external_identity(
            &mut conn,
            &ExternalIdentity {
                subject: "google-42".into(),
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
            },
        )
        .unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.zip.as_deref(), Some("94110"));
    }
}
