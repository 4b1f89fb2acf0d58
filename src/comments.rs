//! Threaded comments on content.
//!
//! Comments form a tree through `parent_comment_id`. Listings load every
//! comment of an item once and walk an arena keyed by parent id, nesting
//! replies up to a configured depth. Editing and deleting are reserved to the
//! comment's author; deleting removes the whole subtree.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    content::AuthorRef,
    db::{DbConnection, comments, content, users},
    error::{ServiceError, ServiceResult},
    models::{Comment, NewComment},
    notifications::{self, Notified},
    roles::{Actor, Permissions, authorize},
};

/// Default nesting depth of reply trees.
pub const DEFAULT_DEPTH: usize = 3;

/// Public view of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    /// Row id.
    pub id: i32,
    /// Trimmed comment body.
    pub comment_text: String,
    /// The content item discussed.
    pub content_id: i32,
    /// The comment author.
    pub user: AuthorRef,
    /// The comment replied to, if any.
    pub parent_comment_id: Option<i32>,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
    /// Last edit time (UTC).
    pub updated_at: NaiveDateTime,
    /// Direct replies, counted even when not nested.
    pub replies_count: i64,
    /// Nested replies; absent past the depth limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentView>>,
}

/// Top-level comments of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    /// Top-level comments, newest first, with nested replies.
    pub comments: Vec<CommentView>,
    /// Every comment on the item, replies included.
    pub total: usize,
}

fn flat(c: Comment, username: String, replies_count: i64) -> CommentView {
    CommentView {
        id: c.id,
        comment_text: c.comment_text,
        content_id: c.content_id,
        user: AuthorRef {
            id: c.user_id,
            username,
        },
        parent_comment_id: c.parent_comment_id,
        created_at: c.created_at,
        updated_at: c.updated_at,
        replies_count,
        replies: None,
    }
}

struct Arena {
    children: HashMap<Option<i32>, Vec<Comment>>,
    names: HashMap<i32, String>,
}

impl Arena {
    fn direct_replies(&self, id: i32) -> i64 {
        self.children
            .get(&Some(id))
            .map_or(0, |v| i64::try_from(v.len()).unwrap_or(i64::MAX))
    }

    fn build(&self, c: &Comment, depth: usize) -> CommentView {
        let mut view = flat(
            c.clone(),
            self.names.get(&c.user_id).cloned().unwrap_or_default(),
            self.direct_replies(c.id),
        );
        if depth > 0 {
            view.replies = Some(
                self.children
                    .get(&Some(c.id))
                    .map(|kids| kids.iter().map(|k| self.build(k, depth - 1)).collect())
                    .unwrap_or_default(),
            );
        }
        view
    }
}

fn now() -> NaiveDateTime { Utc::now().naive_utc() }

fn clean(text: &str) -> ServiceResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation("Comment text is required"));
    }
    Ok(trimmed)
}

async fn load_owned(
    conn: &mut DbConnection,
    actor: &Actor,
    comment_id: i32,
    action: &str,
) -> ServiceResult<Comment> {
    let comment = comments::get_comment(conn, comment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment not found"))?;
    if comment.user_id != actor.user_id {
        return Err(ServiceError::forbidden(format!(
            "Unauthorized to {action} this comment"
        )));
    }
    Ok(comment)
}

async fn username(conn: &mut DbConnection, user_id: i32) -> ServiceResult<String> {
    Ok(users::usernames(conn, &[user_id])
        .await?
        .remove(&user_id)
        .unwrap_or_default())
}

/// Comment on a content item, optionally in reply to another comment on the
/// same item.
///
/// Notifies the content author and, for replies, the parent's author. Nobody
/// is notified about their own comment.
///
/// # Errors
/// Returns `Validation` for blank text or a parent on another item,
/// `NotFound` for unknown content.
pub async fn create_comment(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
    text: &str,
    parent_id: Option<i32>,
) -> ServiceResult<Notified<CommentView>> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let body = clean(text)?;
    let user_id = actor.user_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let item = content::get_content(conn, content_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Content not found"))?;
            let parent_author = match parent_id {
                Some(pid) => {
                    let parent = comments::get_comment(conn, pid)
                        .await?
                        .filter(|p| p.content_id == content_id)
                        .ok_or_else(|| ServiceError::validation("Invalid parent comment"))?;
                    Some(parent.user_id)
                }
                None => None,
            };
            let ts = now();
            let comment = comments::create_comment(
                conn,
                &NewComment {
                    comment_text: body,
                    content_id,
                    user_id,
                    parent_comment_id: parent_id,
                    created_at: ts,
                    updated_at: ts,
                },
            )
            .await?;
            info!(comment_id = comment.id, content_id, user_id, parent_id, "comment created");

            let name = username(conn, user_id).await?;
            let mut notices = Vec::new();
            if item.author_id != user_id {
                notices.push(notifications::new_comment(&comment, &name, item.author_id, ts));
            }
            if let Some(recipient) = parent_author.filter(|&a| a != user_id) {
                notices.extend(notifications::comment_reply(&comment, &name, recipient, ts));
            }
            Ok(Notified {
                value: flat(comment, name, 0),
                notifications: notices,
            })
        })
    })
    .await
}

/// Top-level comments of an item with replies nested down to `max_depth`
/// levels, newest first at every level. `total` counts every comment on the
/// item, replies included.
///
/// # Errors
/// Returns `NotFound` for unknown content.
pub async fn list_comments(
    conn: &mut DbConnection,
    content_id: i32,
    max_depth: usize,
) -> ServiceResult<CommentThread> {
    if content::get_content(conn, content_id).await?.is_none() {
        return Err(ServiceError::not_found("Content not found"));
    }
    let rows = comments::comments_for_content(conn, content_id).await?;
    let total = rows.len();
    let mut user_ids: Vec<i32> = rows.iter().map(|c| c.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let names = users::usernames(conn, &user_ids).await?;

    let mut children: HashMap<Option<i32>, Vec<Comment>> = HashMap::new();
    let (top, replies): (Vec<Comment>, Vec<Comment>) =
        rows.into_iter().partition(|c| c.parent_comment_id.is_none());
    for reply in replies {
        children.entry(reply.parent_comment_id).or_default().push(reply);
    }
    let arena = Arena { children, names };
    let comments = top.iter().map(|c| arena.build(c, max_depth)).collect();
    Ok(CommentThread { comments, total })
}

/// Every reply below a comment at any depth, flattened in breadth-first
/// order.
///
/// # Errors
/// Returns `NotFound` for an unknown comment.
pub async fn all_replies(conn: &mut DbConnection, comment_id: i32) -> ServiceResult<Vec<CommentView>> {
    if comments::get_comment(conn, comment_id).await?.is_none() {
        return Err(ServiceError::not_found("Comment not found"));
    }
    let ids = comments::descendant_ids(conn, comment_id).await?;
    let mut rows = comments::comments_by_ids(conn, &ids).await?;
    let counts = comments::reply_counts(conn, &ids).await?;
    let mut user_ids: Vec<i32> = rows.values().map(|c| c.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let names = users::usernames(conn, &user_ids).await?;
    Ok(ids
        .into_iter()
        .filter_map(|id| rows.remove(&id))
        .map(|c| {
            let name = names.get(&c.user_id).cloned().unwrap_or_default();
            let n = counts.get(&c.id).copied().unwrap_or(0);
            flat(c, name, n)
        })
        .collect())
}

/// Replace the text of the actor's own comment.
///
/// # Errors
/// Returns `Validation` for blank text, `NotFound` for an unknown comment and
/// `Forbidden` for anyone but its author.
pub async fn update_comment(
    conn: &mut DbConnection,
    actor: &Actor,
    comment_id: i32,
    text: &str,
) -> ServiceResult<CommentView> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let body = clean(text)?;
    let author = *actor;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            load_owned(conn, &author, comment_id, "edit").await?;
            let row = comments::update_comment_text(conn, comment_id, body, now()).await?;
            info!(comment_id, user_id = author.user_id, "comment updated");
            let name = username(conn, row.user_id).await?;
            let n = comments::reply_counts(conn, &[row.id])
                .await?
                .get(&row.id)
                .copied()
                .unwrap_or(0);
            Ok(flat(row, name, n))
        })
    })
    .await
}

/// Delete the actor's own comment and every reply below it.
///
/// Returns the number of comments removed.
///
/// # Errors
/// Returns `NotFound` for an unknown comment and `Forbidden` for anyone but
/// its author.
pub async fn delete_comment(
    conn: &mut DbConnection,
    actor: &Actor,
    comment_id: i32,
) -> ServiceResult<usize> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let author = *actor;
    let removed = conn
        .transaction::<_, ServiceError, _>(|conn| {
            Box::pin(async move {
                load_owned(conn, &author, comment_id, "delete").await?;
                let mut ids = comments::descendant_ids(conn, comment_id).await?;
                ids.push(comment_id);
                Ok(comments::delete_comments(conn, &ids).await?)
            })
        })
        .await?;
    info!(comment_id, user_id = actor.user_id, removed, "comment deleted");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        content::{ContentInput, create_content},
        error::StatusKind,
        models::Role,
        notifications::NotificationKind,
        test_support::{migrated_conn, seed_actor, seed_category},
    };

    async fn seed_item(conn: &mut DbConnection, author: &Actor) -> i32 {
        let cat = seed_category(conn, author, "Rust").await;
        create_content(
            conn,
            author,
            ContentInput {
                title: "Post".into(),
                content_type: "article".into(),
                category_id: cat,
                ..ContentInput::default()
            },
        )
        .await
        .expect("seed content")
        .id
    }

    #[rstest]
    #[tokio::test]
    async fn replies_notify_parent_and_content_authors(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let author = seed_actor(&mut conn, "author", Role::TechWriter).await;
        let alice = seed_actor(&mut conn, "alice", Role::User).await;
        let bob = seed_actor(&mut conn, "bob", Role::User).await;
        let item = seed_item(&mut conn, &author).await;

        let top = create_comment(&mut conn, &alice, item, "First!", None)
            .await
            .expect("comment");
        assert_eq!(top.notifications.len(), 1);
        assert_eq!(
            top.notifications.first().map(|n| (n.user_id, n.kind)),
            Some((author.user_id, NotificationKind::NewComment))
        );

        let reply = create_comment(&mut conn, &bob, item, "Welcome", Some(top.value.id))
            .await
            .expect("reply");
        let recipients: Vec<_> = reply
            .notifications
            .iter()
            .map(|n| (n.user_id, n.kind))
            .collect();
        assert_eq!(
            recipients,
            vec![
                (author.user_id, NotificationKind::NewComment),
                (alice.user_id, NotificationKind::CommentReply),
            ]
        );

        let own = create_comment(&mut conn, &alice, item, "Thanks", Some(reply.value.id))
            .await
            .expect("reply");
        assert_eq!(own.notifications.len(), 2);
        let self_reply = create_comment(&mut conn, &author, item, "Mine", None)
            .await
            .expect("author comment");
        assert!(self_reply.notifications.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn parent_must_share_content(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let author = seed_actor(&mut conn, "author", Role::Admin).await;
        let first = seed_item(&mut conn, &author).await;
        let second = create_content(
            &mut conn,
            &author,
            ContentInput {
                title: "Other".into(),
                content_type: "video".into(),
                category_id: 1,
                ..ContentInput::default()
            },
        )
        .await
        .expect("second item")
        .id;
        let parent = create_comment(&mut conn, &author, first, "On first", None)
            .await
            .expect("comment");

        let cross = create_comment(&mut conn, &author, second, "Cross", Some(parent.value.id))
            .await
            .expect_err("wrong content");
        assert_eq!(cross.to_string(), "Invalid parent comment");
        let blank = create_comment(&mut conn, &author, first, "  ", None)
            .await
            .expect_err("blank");
        assert_eq!(blank.status(), StatusKind::BadRequest);
        let orphan = create_comment(&mut conn, &author, 999, "Hello", None)
            .await
            .expect_err("no content");
        assert_eq!(orphan.status(), StatusKind::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn listing_caps_depth_but_counts_replies(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let admin = seed_actor(&mut conn, "root", Role::Admin).await;
        let item = seed_item(&mut conn, &admin).await;
        let mut parent = None;
        let mut chain = Vec::new();
        for level in 0..5 {
            let c = create_comment(&mut conn, &user, item, &format!("level {level}"), parent)
                .await
                .expect("comment");
            parent = Some(c.value.id);
            chain.push(c.value.id);
        }

        let thread = list_comments(&mut conn, item, 2).await.expect("list");
        assert_eq!(thread.total, 5);
        assert_eq!(thread.comments.len(), 1);
        let root = thread.comments.first().expect("root");
        assert_eq!(root.replies_count, 1);
        let child = root
            .replies
            .as_ref()
            .and_then(|r| r.first())
            .expect("depth 1");
        let grandchild = child
            .replies
            .as_ref()
            .and_then(|r| r.first())
            .expect("depth 2");
        assert_eq!(grandchild.replies, None);
        assert_eq!(grandchild.replies_count, 1);

        let (root_id, below) = chain.split_first().expect("chain");
        let flat = all_replies(&mut conn, *root_id).await.expect("flatten");
        let ids: Vec<i32> = flat.iter().map(|c| c.id).collect();
        assert_eq!(ids, below.to_vec());
    }

    #[rstest]
    #[tokio::test]
    async fn total_counts_replies_and_newest_reply_leads(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let admin = seed_actor(&mut conn, "root", Role::Admin).await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let item = seed_item(&mut conn, &admin).await;
        let top = create_comment(&mut conn, &user, item, "Question", None)
            .await
            .expect("comment");
        let older = create_comment(&mut conn, &admin, item, "First answer", Some(top.value.id))
            .await
            .expect("reply");
        let newer = create_comment(&mut conn, &user, item, "Follow-up", Some(top.value.id))
            .await
            .expect("reply");

        let thread = list_comments(&mut conn, item, DEFAULT_DEPTH)
            .await
            .expect("list");
        assert_eq!(thread.total, 3);
        let root = thread.comments.first().expect("top-level comment");
        let order: Vec<i32> = root
            .replies
            .iter()
            .flatten()
            .map(|r| r.id)
            .collect();
        assert_eq!(order, vec![newer.value.id, older.value.id]);
    }

    #[rstest]
    #[tokio::test]
    async fn only_authors_edit_or_delete(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let admin = seed_actor(&mut conn, "root", Role::Admin).await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let item = seed_item(&mut conn, &admin).await;
        let top = create_comment(&mut conn, &user, item, "Original", None)
            .await
            .expect("comment");
        create_comment(&mut conn, &admin, item, "Reply", Some(top.value.id))
            .await
            .expect("reply");

        let hijack = update_comment(&mut conn, &admin, top.value.id, "Hijack")
            .await
            .expect_err("admins have no override");
        assert_eq!(hijack.status(), StatusKind::Forbidden);
        let edited = update_comment(&mut conn, &user, top.value.id, "Edited")
            .await
            .expect("edit");
        assert_eq!(edited.comment_text, "Edited");
        assert_eq!(edited.replies_count, 1);

        let denied = delete_comment(&mut conn, &admin, top.value.id)
            .await
            .expect_err("not the author");
        assert_eq!(denied.status(), StatusKind::Forbidden);
        let removed = delete_comment(&mut conn, &user, top.value.id)
            .await
            .expect("delete");
        assert_eq!(removed, 2);
        let thread = list_comments(&mut conn, item, DEFAULT_DEPTH)
            .await
            .expect("list");
        assert_eq!(thread.total, 0);
    }
}
