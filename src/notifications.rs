//! Notification payloads and the delivery seam.
//!
//! The builders are pure: they turn an event and the rows involved into
//! [`Notification`] records. Operations that trigger events return the records
//! alongside their result; delivery is left to a [`NotificationTransport`].

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    db::{DbConnection, categories, subscriptions},
    error::ServiceResult,
    models::{Comment, Content, ContentStatus},
};

/// Number of characters of a comment quoted in a notification.
pub const EXCERPT_CHARS: usize = 50;

/// Event that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Content was published in a category the recipient follows.
    NewContent,
    /// The recipient's content was approved.
    ContentApproved,
    /// The recipient's content was flagged.
    ContentFlagged,
    /// Someone commented on the recipient's content.
    NewComment,
    /// Someone replied to the recipient's comment.
    CommentReply,
    /// The recipient's account was deactivated.
    AccountDeactivated,
}

/// A structured event description addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Recipient.
    pub user_id: i32,
    /// Content the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<i32>,
    /// Comment the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<i32>,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Subject line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Deep link into the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// When the notification was built.
    pub created_at: NaiveDateTime,
}

/// A result together with the notifications its operation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notified<T> {
    /// The operation result.
    pub value: T,
    /// Payloads to hand to a transport.
    pub notifications: Vec<Notification>,
}

/// Quote the start of a comment: the first [`EXCERPT_CHARS`] characters
/// followed by `...`.
#[must_use]
pub fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}

fn content_link(content_id: i32) -> String { format!("/content/{content_id}") }

fn comment_link(comment: &Comment) -> String {
    format!("/content/{}#comment-{}", comment.content_id, comment.id)
}

/// One `new_content` notification per subscriber. Unpublished content
/// notifies nobody.
#[must_use]
pub fn new_content(
    item: &Content,
    category_name: &str,
    subscribers: &[i32],
    now: NaiveDateTime,
) -> Vec<Notification> {
    if item.status() != Ok(ContentStatus::Approved) {
        return Vec::new();
    }
    subscribers
        .iter()
        .map(|&user_id| Notification {
            user_id,
            content_id: Some(item.id),
            comment_id: None,
            kind: NotificationKind::NewContent,
            title: format!("New {} in {}", item.content_type, category_name),
            message: format!("'{}' has been published", item.title),
            link: Some(content_link(item.id)),
            created_at: now,
        })
        .collect()
}

/// Tell the author their content was approved.
#[must_use]
pub fn content_approved(item: &Content, now: NaiveDateTime) -> Notification {
    Notification {
        user_id: item.author_id,
        content_id: Some(item.id),
        comment_id: None,
        kind: NotificationKind::ContentApproved,
        title: "Your content has been approved!".to_owned(),
        message: format!("'{}' is now published", item.title),
        link: Some(content_link(item.id)),
        created_at: now,
    }
}

/// Tell the author their content was flagged and why.
#[must_use]
pub fn content_flagged(item: &Content, reason: &str, now: NaiveDateTime) -> Notification {
    Notification {
        user_id: item.author_id,
        content_id: Some(item.id),
        comment_id: None,
        kind: NotificationKind::ContentFlagged,
        title: "Your content has been flagged".to_owned(),
        message: format!("'{}' was flagged: {reason}", item.title),
        link: Some(content_link(item.id)),
        created_at: now,
    }
}

/// Tell a content author about a new comment.
#[must_use]
pub fn new_comment(
    comment: &Comment,
    commenter: &str,
    content_author_id: i32,
    now: NaiveDateTime,
) -> Notification {
    Notification {
        user_id: content_author_id,
        content_id: Some(comment.content_id),
        comment_id: Some(comment.id),
        kind: NotificationKind::NewComment,
        title: "New comment on your content".to_owned(),
        message: format!("{commenter} commented: {}", excerpt(&comment.comment_text)),
        link: Some(comment_link(comment)),
        created_at: now,
    }
}

/// Tell a comment author about a reply. Top-level comments are not replies.
#[must_use]
pub fn comment_reply(
    comment: &Comment,
    commenter: &str,
    parent_author_id: i32,
    now: NaiveDateTime,
) -> Option<Notification> {
    comment.parent_comment_id?;
    Some(Notification {
        user_id: parent_author_id,
        content_id: Some(comment.content_id),
        comment_id: Some(comment.id),
        kind: NotificationKind::CommentReply,
        title: "New reply to your comment".to_owned(),
        message: format!("{commenter} replied: {}", excerpt(&comment.comment_text)),
        link: Some(comment_link(comment)),
        created_at: now,
    })
}

/// Tell a user their account was deactivated.
#[must_use]
pub fn account_deactivated(user_id: i32, reason: Option<&str>, now: NaiveDateTime) -> Notification {
    Notification {
        user_id,
        content_id: None,
        comment_id: None,
        kind: NotificationKind::AccountDeactivated,
        title: "Your account has been deactivated".to_owned(),
        message: reason.map_or_else(
            || "Contact admin for details".to_owned(),
            |r| format!("Reason: {r}"),
        ),
        link: None,
        created_at: now,
    }
}

/// Look up the subscribers of a published item's category and build their
/// `new_content` notifications.
///
/// # Errors
/// Returns any store error raised by the lookups.
pub async fn collect_new_content(
    conn: &mut DbConnection,
    item: &Content,
    now: NaiveDateTime,
) -> ServiceResult<Vec<Notification>> {
    if item.status() != Ok(ContentStatus::Approved) {
        return Ok(Vec::new());
    }
    let Some(category) = categories::get_category(conn, item.category_id).await? else {
        return Ok(Vec::new());
    };
    let targets = subscriptions::notify_targets(conn, item.category_id).await?;
    Ok(new_content(item, &category.name, &targets, now))
}

/// Errors raised while handing notifications to a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport refused or failed to accept the payload.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivery adapter for built notifications (email, push, in-app).
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Hand a batch of notifications to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the batch cannot be accepted.
    async fn deliver(&self, batch: &[Notification]) -> Result<(), TransportError>;
}

/// Transport that records notifications in the log and delivers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransport;

#[async_trait]
impl NotificationTransport for TracingTransport {
    async fn deliver(&self, batch: &[Notification]) -> Result<(), TransportError> {
        for n in batch {
            info!(
                user_id = n.user_id,
                content_id = n.content_id,
                comment_id = n.comment_id,
                kind = ?n.kind,
                title = %n.title,
                "notification"
            );
        }
        Ok(())
    }
}
