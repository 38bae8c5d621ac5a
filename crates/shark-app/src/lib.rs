//! Companion surfaces around the coach: Shark Bot chat, the match finder,
//! dashboard stats, profile edits, and player geolocation.

pub mod chat;
pub mod dashboard;
pub mod geo;
pub mod matches;
pub mod profile;
