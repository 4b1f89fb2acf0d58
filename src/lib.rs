//! Core library for the pressroom publishing backend.
//!
//! Content moves through a moderation workflow (draft, pending, approved,
//! flagged) and collects threaded comments, like/dislike reviews, category
//! subscriptions and wishlist entries. Every operation takes an explicit
//! database connection and an acting user, checks the role policy in
//! [`roles`], and returns a typed result or a [`error::ServiceError`]. Only
//! one database backend (either `sqlite` or `postgres`) should be enabled at a
//! time.

pub mod accounts;
pub mod categories;
pub mod comments;
pub mod content;
pub mod db;
pub mod error;
pub mod handler;
pub mod models;
pub mod notifications;
pub mod reviews;
pub mod roles;
#[allow(
    missing_docs,
    reason = "Diesel table! macro generates items that cannot be documented"
)]
pub mod schema;
pub mod server;
pub mod subscriptions;
pub mod users;
pub mod wishlist;

#[cfg(test)]
mod test_support;
