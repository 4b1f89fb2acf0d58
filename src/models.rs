//! Row types and string-backed enumerations persisted by the store.
//!
//! Enumerated columns (`role`, `content_type`, `status`, `review_type`) are
//! stored as text so both backends share one schema. Row structs keep the raw
//! strings and expose typed accessors that reject values outside the known set.

#![expect(
    missing_docs,
    reason = "row fields mirror the columns declared in schema.rs one to one"
)]

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{categories, comments, content, content_reviews, subscriptions, users, wishlists};

/// A stored string did not match any variant of the named enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct UnknownVariant {
    /// Column or enumeration name, such as `content_type`.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The persisted text form.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
    };
}

text_enum! {
    /// Account role gating which operations a user may perform.
    Role, "role" {
        /// Full moderation and management rights.
        Admin => "admin",
        /// May author drafts, approve and flag content.
        TechWriter => "tech_writer",
        /// Reader who may submit content for review.
        User => "user",
    }
}

text_enum! {
    /// Media kind of a content item.
    ContentType, "content_type" {
        /// Video content, usually hosted externally.
        Video => "video",
        /// Audio content.
        Audio => "audio",
        /// Long-form text.
        Article => "article",
    }
}

text_enum! {
    /// Moderation state of a content item.
    ContentStatus, "status" {
        /// Work in progress, visible to its author only.
        Draft => "draft",
        /// Submitted and waiting for a moderator.
        Pending => "pending",
        /// Published.
        Approved => "approved",
        /// Withdrawn by a moderator with a reason.
        Flagged => "flagged",
        /// Retired. Never produced by this crate; deletion is destructive.
        Removed => "removed",
    }
}

text_enum! {
    /// Reaction a user records against a content item.
    ReviewType, "review_type" {
        /// Positive reaction.
        Like => "like",
        /// Negative reaction.
        Dislike => "dislike",
    }
}

/// A stored account.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub profile_data: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Parse the stored role.
    ///
    /// # Errors
    /// Returns [`UnknownVariant`] when the column holds an unexpected value.
    pub fn role(&self) -> Result<Role, UnknownVariant> { self.role.parse() }
}

/// Insertable account row.
#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub is_active: bool,
    pub profile_data: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial update applied to a user row; `None` fields are left untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub profile_data: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A stored category.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable category row.
#[derive(Insertable, Debug)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub slug: &'a str,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial update applied to a category row.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = categories)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A stored content item.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = content)]
pub struct Content {
    pub id: i32,
    pub title: String,
    pub content_type: String,
    pub content_url: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: String,
    pub flag_reason: Option<String>,
    pub tags: String,
    pub author_id: i32,
    pub category_id: i32,
    pub approved_by: Option<i32>,
    pub views_count: i32,
    pub likes_count: i32,
    pub dislikes_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub published_at: Option<NaiveDateTime>,
}

impl Content {
    /// Parse the stored moderation status.
    ///
    /// # Errors
    /// Returns [`UnknownVariant`] when the column holds an unexpected value.
    pub fn status(&self) -> Result<ContentStatus, UnknownVariant> { self.status.parse() }

    /// Decode the JSON tag list; a malformed column reads as no tags.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> { serde_json::from_str(&self.tags).unwrap_or_default() }
}

/// Insertable content row.
#[derive(Insertable, Debug)]
#[diesel(table_name = content)]
pub struct NewContent<'a> {
    pub title: &'a str,
    pub content_type: &'a str,
    pub content_url: Option<&'a str>,
    pub description: Option<&'a str>,
    pub body: Option<&'a str>,
    pub thumbnail_url: Option<&'a str>,
    pub status: &'a str,
    pub tags: &'a str,
    pub author_id: i32,
    pub category_id: i32,
    pub views_count: i32,
    pub likes_count: i32,
    pub dislikes_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Editable content columns. Nested options distinguish "leave alone"
/// (`None`) from "clear" (`Some(None)`).
#[derive(AsChangeset, Debug, Default, Clone)]
#[diesel(table_name = content)]
pub struct ContentChanges {
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub content_url: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub body: Option<Option<String>>,
    pub thumbnail_url: Option<Option<String>>,
    pub category_id: Option<i32>,
    pub tags: Option<String>,
    pub status: Option<String>,
    pub flag_reason: Option<Option<String>>,
    pub approved_by: Option<Option<i32>>,
    pub published_at: Option<Option<NaiveDateTime>>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A stored comment.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub comment_text: String,
    pub content_id: i32,
    pub user_id: i32,
    pub parent_comment_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable comment row.
#[derive(Insertable, Debug)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub comment_text: &'a str,
    pub content_id: i32,
    pub user_id: i32,
    pub parent_comment_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A stored like or dislike.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = content_reviews)]
pub struct ContentReview {
    pub id: i32,
    pub content_id: i32,
    pub user_id: i32,
    pub review_type: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable review row.
#[derive(Insertable, Debug)]
#[diesel(table_name = content_reviews)]
pub struct NewContentReview<'a> {
    pub content_id: i32,
    pub user_id: i32,
    pub review_type: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A stored category subscription.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = subscriptions)]
pub struct Subscription {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub notify_on_new_content: bool,
    pub created_at: NaiveDateTime,
}

/// Insertable subscription row.
#[derive(Insertable, Debug)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    pub user_id: i32,
    pub category_id: i32,
    pub notify_on_new_content: bool,
    pub created_at: NaiveDateTime,
}

/// A stored wishlist entry.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = wishlists)]
pub struct Wishlist {
    pub id: i32,
    pub user_id: i32,
    pub content_id: i32,
    pub created_at: NaiveDateTime,
}

/// Insertable wishlist row.
#[derive(Insertable, Debug)]
#[diesel(table_name = wishlists)]
pub struct NewWishlist {
    pub user_id: i32,
    pub content_id: i32,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("draft", ContentStatus::Draft)]
    #[case("pending", ContentStatus::Pending)]
    #[case("approved", ContentStatus::Approved)]
    #[case("flagged", ContentStatus::Flagged)]
    #[case("removed", ContentStatus::Removed)]
    fn status_parses_stored_text(#[case] text: &str, #[case] expected: ContentStatus) {
        assert_eq!(text.parse::<ContentStatus>(), Ok(expected));
        assert_eq!(expected.as_str(), text);
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let err = "podcast".parse::<ContentType>().expect_err("must reject");
        assert_eq!(err.kind, "content_type");
        assert_eq!(err.to_string(), "invalid content_type 'podcast'");
    }

    #[test]
    fn role_serializes_as_snake_case() {
        let json = serde_json::to_string(&Role::TechWriter).expect("serialize");
        assert_eq!(json, "\"tech_writer\"");
    }

    #[test]
    fn enum_lists_are_complete() {
        assert_eq!(ReviewType::ALL, &[ReviewType::Like, ReviewType::Dislike]);
        assert_eq!(ContentType::ALL.len(), 3);
    }
}
