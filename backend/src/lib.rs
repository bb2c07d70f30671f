//! Swipe-to-match exchange for waste material and reusable parts.
//!
//! Users post listings, are shown other users' listings one card at a time,
//! and swipe yes or no. Two users who each said yes to one of the other's
//! listings get a match.

pub mod app;
pub mod auth;
pub mod candidate;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod listing;
pub mod matches;
pub mod models;
pub mod schema;
pub mod swipe;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;
