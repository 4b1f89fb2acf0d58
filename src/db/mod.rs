//! Manage database connections and domain queries.
//!
//! This module tree exposes helpers for creating pooled Diesel connections,
//! running embedded migrations, and executing queries grouped by entity.
//! Every helper takes the connection explicitly; callers decide the
//! transaction boundary.

pub mod categories;
mod connection;
pub mod comments;
pub mod content;
mod migrations;
mod pagination;
pub mod reviews;
pub mod subscriptions;
pub mod users;
pub mod wishlists;


pub use self::{
    connection::{Backend, DbConnection, DbPool, MIGRATIONS, establish_pool},
    content::{ContentFilter, ContentOrder},
    migrations::{MIGRATION_TIMEOUT, MigrationError, apply_migrations, open_migrated, run_migrations},
    pagination::{Page, PageRequest},
};
