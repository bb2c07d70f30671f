use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

/// A value outside one of the closed vocabularies stored as text columns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must be {expected}")]
pub struct InvalidValue {
    pub field: &'static str,
    pub expected: &'static str,
}

// Closed vocabularies persisted as lowercase TEXT. The migration carries a
// matching CHECK constraint for each column.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal, $expected:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
        )]
        #[serde(rename_all = "lowercase")]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(InvalidValue {
                        field: $field,
                        expected: $expected,
                    }),
                }
            }
        }

        impl ToSql<Text, Sqlite> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $name {
            fn from_sql(value: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Text, Sqlite>>::from_sql(value)?;
                Ok(text.parse::<Self>()?)
            }
        }
    };
}

text_enum! {
    /// What is being listed.
    ListingType ("listing_type", "'waste' or 'part'") {
        Waste => "waste",
        Part => "part",
    }
}

text_enum! {
    /// Whether the owner has the item or is looking for it.
    Intent ("intent", "'offer' or 'need'") {
        Offer => "offer",
        Need => "need",
    }
}

text_enum! {
    Decision ("decision", "yes or no") {
        Yes => "yes",
        No => "no",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::listings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Listing {
    pub id: i32,
    pub owner_user_id: String,
    pub listing_type: ListingType,
    pub intent: Intent,
    pub category: String,
    pub query_text: String,
    pub condition: Option<String>,
    pub price: Option<f64>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::swipes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Swipe {
    pub id: i32,
    pub swiper_user_id: String,
    pub listing_id: i32,
    pub decision: Decision,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::matches)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Match {
    pub id: i32,
    pub listing_a_id: i32,
    pub listing_b_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub zip: Option<&'a str>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = crate::schema::listings)]
pub struct NewListing {
    pub owner_user_id: String,
    pub listing_type: ListingType,
    pub intent: Intent,
    pub category: String,
    pub query_text: String,
    pub condition: Option<String>,
    pub price: Option<f64>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::swipes)]
pub struct NewSwipe<'a> {
    pub swiper_user_id: &'a str,
    pub listing_id: i32,
    pub decision: Decision,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::matches)]
pub struct NewMatch {
    pub listing_a_id: i32,
    pub listing_b_id: i32,
    pub created_at: NaiveDateTime,
}

/// Body of `POST /listings`. Enumerated fields arrive as free text and are
/// validated before anything is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingRequest {
    #[serde(default)]
    pub listing_type: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub query_text: String,
    pub condition: Option<String>,
    pub price: Option<f64>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Body of `POST /me`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeRequest {
    pub listing_id: Option<i32>,
    #[serde(default)]
    pub decision: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeOutcome {
    pub matched: bool,
    pub match_id: Option<i32>,
}

impl SwipeOutcome {
    pub const fn unmatched() -> Self {
        Self {
            matched: false,
            match_id: None,
        }
    }

    pub const fn matched(match_id: i32) -> Self {
        Self {
            matched: true,
            match_id: Some(match_id),
        }
    }
}

/// A match together with both paired listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDetails {
    pub match_id: i32,
    pub created_at: NaiveDateTime,
    pub listing_a: Listing,
    pub listing_b: Listing,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextQuery {
    pub listing_type: Option<String>,
    pub intent: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub max_km: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub assertion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("waste", ListingType::Waste)]
    #[case(" Part ", ListingType::Part)]
    #[case("WASTE", ListingType::Waste)]
    fn listing_type_parses_case_insensitively(#[case] raw: &str, #[case] expected: ListingType) {
        assert_eq!(raw.parse::<ListingType>(), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("scrap")]
    #[case("offer")]
    fn listing_type_rejects_other_values(#[case] raw: &str) {
        let err = raw.parse::<ListingType>().unwrap_err();
        assert_eq!(err.to_string(), "listing_type must be 'waste' or 'part'");
    }

    #[test]
    fn intent_and_decision_report_their_field() {
        assert_eq!(
            "maybe".parse::<Decision>().unwrap_err().to_string(),
            "decision must be yes or no"
        );
        assert_eq!(
            "give".parse::<Intent>().unwrap_err().to_string(),
            "intent must be 'offer' or 'need'"
        );
    }

    #[test]
    fn enums_serialize_as_lowercase_text() {
        let json = serde_json::to_string(&(ListingType::Part, Intent::Need, Decision::Yes)).unwrap();
        assert_eq!(json, r#"["part","need","yes"]"#);
    }
}
