//! Content lifecycle: submission, editing, moderation, viewing and browsing.
//!
//! New content starts as `draft` or `pending`. Moderators move it to
//! `approved` (stamping the approver and `published_at`) or `flagged` (with a
//! reason). Tech writers may only approve pending items; admins may approve
//! from any state. Deletion is destructive and cascades to comments, reviews
//! and wishlist entries, so the `removed` status is never written.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    db::{
        ContentFilter,
        ContentOrder,
        DbConnection,
        Page,
        PageRequest,
        categories,
        comments,
        content,
        subscriptions,
        users,
    },
    error::{ServiceError, ServiceResult},
    models::{Content, ContentChanges, ContentStatus, ContentType, NewContent},
    notifications::{self, Notified},
    roles::{Actor, Permissions, authorize},
};

/// Recommendations returned when the caller gives no limit.
pub const DEFAULT_RECOMMENDATIONS: i64 = 10;
const MAX_RECOMMENDATIONS: i64 = 100;

/// Author reference embedded in content views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    /// User id.
    pub id: i32,
    /// Login name.
    pub username: String,
}

/// Category reference embedded in content views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    /// Category id.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// URL-safe identifier.
    pub slug: String,
}

/// Public view of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentView {
    /// Row id.
    pub id: i32,
    /// Headline.
    pub title: String,
    /// `video`, `audio` or `article`.
    pub content_type: String,
    /// Link to externally hosted media.
    pub content_url: Option<String>,
    /// Short summary.
    pub description: Option<String>,
    /// Preview image link.
    pub thumbnail_url: Option<String>,
    /// Moderation status.
    pub status: String,
    /// Why a moderator flagged the item.
    pub flag_reason: Option<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Submitting user.
    pub author: AuthorRef,
    /// Category the item is filed under.
    pub category: CategoryRef,
    /// Times the approved item was viewed.
    pub views_count: i32,
    /// Current like reviews.
    pub likes_count: i32,
    /// Current dislike reviews.
    pub dislikes_count: i32,
    /// Comments of any depth.
    pub comments_count: i64,
    /// Submission time (UTC).
    pub created_at: NaiveDateTime,
    /// Last edit time (UTC).
    pub updated_at: NaiveDateTime,
    /// Time of the most recent approval.
    pub published_at: Option<NaiveDateTime>,
    /// Moderator who last approved the item.
    pub approved_by: Option<i32>,
    /// Full text; present only when requested and non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Input for new content.
#[derive(Debug, Clone, Default)]
pub struct ContentInput {
    /// Headline; must not be blank.
    pub title: String,
    /// `video`, `audio` or `article`.
    pub content_type: String,
    /// Existing category to file under.
    pub category_id: i32,
    /// Short summary.
    pub description: Option<String>,
    /// Link to externally hosted media.
    pub content_url: Option<String>,
    /// Full text.
    pub body: Option<String>,
    /// Preview image link.
    pub thumbnail_url: Option<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Requested initial status; only writers and admins may choose.
    pub status: Option<String>,
}

/// Edits to content. `None` leaves a field alone; `Some(None)` clears a
/// nullable field.
#[derive(Debug, Clone, Default)]
pub struct ContentUpdate {
    /// New headline; must not be blank.
    pub title: Option<String>,
    /// New media kind.
    pub content_type: Option<String>,
    /// Move to another existing category.
    pub category_id: Option<i32>,
    /// Replace or clear the summary.
    pub description: Option<Option<String>>,
    /// Replace or clear the media link.
    pub content_url: Option<Option<String>>,
    /// Replace or clear the full text.
    pub body: Option<Option<String>>,
    /// Replace or clear the preview image.
    pub thumbnail_url: Option<Option<String>>,
    /// Replace the labels.
    pub tags: Option<Vec<String>>,
    /// Only `draft` or `pending`.
    pub status: Option<String>,
}

/// Filters for the public listing.
#[derive(Debug, Clone, Default)]
pub struct BrowseQuery {
    /// Only items in this category.
    pub category_id: Option<i32>,
    /// Only items of this media kind.
    pub content_type: Option<String>,
    /// Substring matched against title and description.
    pub search: Option<String>,
}

fn now() -> NaiveDateTime { Utc::now().naive_utc() }

fn parse_type(raw: &str) -> ServiceResult<ContentType> {
    raw.parse()
        .map_err(|_| ServiceError::validation("Invalid content type"))
}

fn parse_editable_status(raw: &str) -> ServiceResult<ContentStatus> {
    match raw.parse::<ContentStatus>() {
        Ok(s @ (ContentStatus::Draft | ContentStatus::Pending)) => Ok(s),
        _ => Err(ServiceError::validation(
            "Status can only be set to draft or pending",
        )),
    }
}

fn encode_tags(tags: &[String]) -> ServiceResult<String> {
    serde_json::to_string(tags).map_err(|e| ServiceError::validation(e.to_string()))
}

async fn require_category(conn: &mut DbConnection, category_id: i32) -> ServiceResult<()> {
    if categories::get_category(conn, category_id).await?.is_none() {
        return Err(ServiceError::not_found("Category not found"));
    }
    Ok(())
}

async fn load(conn: &mut DbConnection, content_id: i32) -> ServiceResult<Content> {
    content::get_content(conn, content_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Content not found"))
}

/// Render rows with their author, category and comment count, batching the
/// lookups.
///
/// # Errors
/// Returns any store error.
pub async fn render(
    conn: &mut DbConnection,
    rows: Vec<Content>,
    include_body: bool,
) -> ServiceResult<Vec<ContentView>> {
    let mut author_ids: Vec<i32> = rows.iter().map(|c| c.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let mut category_ids: Vec<i32> = rows.iter().map(|c| c.category_id).collect();
    category_ids.sort_unstable();
    category_ids.dedup();
    let ids: Vec<i32> = rows.iter().map(|c| c.id).collect();

    let names = users::usernames(conn, &author_ids).await?;
    let cats: HashMap<i32, CategoryRef> = categories::categories_by_ids(conn, &category_ids)
        .await?
        .into_iter()
        .map(|c| {
            (
                c.id,
                CategoryRef {
                    id: c.id,
                    name: c.name,
                    slug: c.slug,
                },
            )
        })
        .collect();
    let comment_counts = comments::counts_for_content(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|c| {
            let tags = c.tag_list();
            ContentView {
                id: c.id,
                title: c.title,
                content_type: c.content_type,
                content_url: c.content_url,
                description: c.description,
                thumbnail_url: c.thumbnail_url,
                status: c.status,
                flag_reason: c.flag_reason,
                tags,
                author: AuthorRef {
                    id: c.author_id,
                    username: names.get(&c.author_id).cloned().unwrap_or_default(),
                },
                category: cats.get(&c.category_id).cloned().unwrap_or(CategoryRef {
                    id: c.category_id,
                    name: String::new(),
                    slug: String::new(),
                }),
                views_count: c.views_count,
                likes_count: c.likes_count,
                dislikes_count: c.dislikes_count,
                comments_count: comment_counts.get(&c.id).copied().unwrap_or(0),
                created_at: c.created_at,
                updated_at: c.updated_at,
                published_at: c.published_at,
                approved_by: c.approved_by,
                body: c.body.filter(|b| include_body && !b.is_empty()),
            }
        })
        .collect())
}

async fn render_one(
    conn: &mut DbConnection,
    row: Content,
    include_body: bool,
) -> ServiceResult<ContentView> {
    render(conn, vec![row], include_body)
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Content not found"))
}

/// Submit new content.
///
/// Plain users always submit into `pending`. Writers and admins default to
/// `draft` and may request `pending`.
///
/// # Errors
/// Returns `Validation` for a blank title, unknown type or status,
/// `NotFound` for an unknown category, or a store error.
pub async fn create_content(
    conn: &mut DbConnection,
    actor: &Actor,
    input: ContentInput,
) -> ServiceResult<ContentView> {
    authorize(actor, Permissions::SUBMIT_CONTENT)?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ServiceError::validation("Missing required fields"));
    }
    let kind = parse_type(&input.content_type)?;
    let status = if actor.can(Permissions::CHOOSE_INITIAL_STATUS) {
        input
            .status
            .as_deref()
            .map_or(Ok(ContentStatus::Draft), parse_editable_status)?
    } else {
        ContentStatus::Pending
    };
    let tags = encode_tags(&input.tags)?;
    let author_id = actor.user_id;
    let category_id = input.category_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        let (fields, tag_list) = (&input, &tags);
        Box::pin(async move {
            require_category(conn, category_id).await?;
            let ts = now();
            let row = content::create_content(
                conn,
                &NewContent {
                    title,
                    content_type: kind.as_str(),
                    content_url: fields.content_url.as_deref(),
                    description: fields.description.as_deref(),
                    body: fields.body.as_deref(),
                    thumbnail_url: fields.thumbnail_url.as_deref(),
                    status: status.as_str(),
                    tags: tag_list,
                    author_id,
                    category_id,
                    views_count: 0,
                    likes_count: 0,
                    dislikes_count: 0,
                    created_at: ts,
                    updated_at: ts,
                },
            )
            .await?;
            info!(content_id = row.id, author_id, status = %status, "content created");
            render_one(conn, row, true).await
        })
    })
    .await
}

/// Edit content as its author or an admin.
///
/// Leaving the flagged state clears the flag reason.
///
/// # Errors
/// Returns `NotFound` for unknown content or category, `Forbidden` for
/// non-owners, `Validation` for an unknown type or a status other than
/// `draft`/`pending`.
pub async fn update_content(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
    update: ContentUpdate,
) -> ServiceResult<ContentView> {
    authorize(actor, Permissions::SUBMIT_CONTENT)?;
    let kind = update.content_type.as_deref().map(parse_type).transpose()?;
    let status = update
        .status
        .as_deref()
        .map(parse_editable_status)
        .transpose()?;
    if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ServiceError::validation("Title cannot be empty"));
    }
    let tags = update.tags.as_deref().map(encode_tags).transpose()?;
    let acting = *actor;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let current = load(conn, content_id).await?;
            if !acting.owns_or_overrides(current.author_id) {
                return Err(ServiceError::forbidden("Unauthorized to edit this content"));
            }
            if let Some(category_id) = update.category_id {
                require_category(conn, category_id).await?;
            }
            let leaving_flagged =
                status.is_some() && current.status() == Ok(ContentStatus::Flagged);
            let changes = ContentChanges {
                title: update.title.map(|t| t.trim().to_owned()),
                content_type: kind.map(|k| k.as_str().to_owned()),
                content_url: update.content_url,
                description: update.description,
                body: update.body,
                thumbnail_url: update.thumbnail_url,
                category_id: update.category_id,
                tags,
                status: status.map(|s| s.as_str().to_owned()),
                flag_reason: leaving_flagged.then_some(None),
                updated_at: Some(now()),
                ..ContentChanges::default()
            };
            let row = content::update_content(conn, content_id, &changes).await?;
            info!(content_id, by = acting.user_id, status = %row.status, "content updated");
            render_one(conn, row, true).await
        })
    })
    .await
}

/// Delete content as its author or an admin, with its comments, reviews and
/// wishlist entries.
///
/// # Errors
/// Returns `NotFound` for unknown content and `Forbidden` for non-owners.
pub async fn delete_content(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
) -> ServiceResult<()> {
    authorize(actor, Permissions::SUBMIT_CONTENT)?;
    let acting = *actor;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let current = load(conn, content_id).await?;
            if !acting.owns_or_overrides(current.author_id) {
                return Err(ServiceError::forbidden("Unauthorized to delete this content"));
            }
            content::delete_content_cascade(conn, content_id).await?;
            Ok(())
        })
    })
    .await?;
    info!(content_id, by = acting.user_id, "content deleted");
    Ok(())
}

/// Publish content.
///
/// Sets the approver and `published_at` and clears any flag reason. Returns
/// the author's approval notice and the category subscribers' new-content
/// notices.
///
/// # Errors
/// Returns `Forbidden` for plain users, `NotFound` for unknown content and,
/// for tech writers, `Validation` unless the content is pending.
pub async fn approve_content(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
) -> ServiceResult<Notified<ContentView>> {
    authorize(actor, Permissions::MODERATE_CONTENT)?;
    let acting = *actor;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let current = load(conn, content_id).await?;
            if !acting.can(Permissions::FORCE_APPROVE)
                && current.status() != Ok(ContentStatus::Pending)
            {
                return Err(ServiceError::validation(
                    "Only pending content can be approved",
                ));
            }
            let ts = now();
            let changes = ContentChanges {
                status: Some(ContentStatus::Approved.as_str().to_owned()),
                approved_by: Some(Some(acting.user_id)),
                published_at: Some(Some(ts)),
                flag_reason: Some(None),
                updated_at: Some(ts),
                ..ContentChanges::default()
            };
            let row = content::update_content(conn, content_id, &changes).await?;
            let mut notices = vec![notifications::content_approved(&row, ts)];
            notices.extend(notifications::collect_new_content(conn, &row, ts).await?);
            info!(content_id, approved_by = acting.user_id, "content approved");
            Ok(Notified {
                value: render_one(conn, row, false).await?,
                notifications: notices,
            })
        })
    })
    .await
}

/// Flag content with a reason, from any state but `removed`.
///
/// # Errors
/// Returns `Forbidden` for plain users, `Validation` for a blank reason and
/// `NotFound` for unknown content.
pub async fn flag_content(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
    reason: &str,
) -> ServiceResult<Notified<ContentView>> {
    authorize(actor, Permissions::MODERATE_CONTENT)?;
    let note = reason.trim();
    if note.is_empty() {
        return Err(ServiceError::validation("Flag reason is required"));
    }
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let current = load(conn, content_id).await?;
            if current.status() == Ok(ContentStatus::Removed) {
                return Err(ServiceError::validation("Removed content cannot be flagged"));
            }
            let changes = ContentChanges {
                status: Some(ContentStatus::Flagged.as_str().to_owned()),
                flag_reason: Some(Some(note.to_owned())),
                updated_at: Some(now()),
                ..ContentChanges::default()
            };
            let row = content::update_content(conn, content_id, &changes).await?;
            info!(content_id, by = actor.user_id, reason = note, "content flagged");
            let notice = notifications::content_flagged(&row, note, now());
            Ok(Notified {
                value: render_one(conn, row, false).await?,
                notifications: vec![notice],
            })
        })
    })
    .await
}

/// Fetch one item with its body.
///
/// Unapproved content is reported as not found to everyone but its author.
/// Viewing approved content bumps its view counter.
///
/// # Errors
/// Returns `NotFound` for unknown or hidden content.
pub async fn view_content(
    conn: &mut DbConnection,
    viewer: Option<&Actor>,
    content_id: i32,
) -> ServiceResult<ContentView> {
    let viewer_id = viewer.map(|v| v.user_id);
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let stored = load(conn, content_id).await?;
            let shown = if stored.status() == Ok(ContentStatus::Approved) {
                content::increment_views(conn, content_id).await?
            } else if viewer_id == Some(stored.author_id) {
                stored
            } else {
                return Err(ServiceError::not_found("Content not available"));
            };
            render_one(conn, shown, true).await
        })
    })
    .await
}

/// Approved content, newest first, with optional filters.
///
/// # Errors
/// Returns `Validation` for an unknown content type.
pub async fn list_published(
    conn: &mut DbConnection,
    query: &BrowseQuery,
    page: PageRequest,
) -> ServiceResult<Page<ContentView>> {
    let kind = query.content_type.as_deref().map(parse_type).transpose()?;
    let filter = ContentFilter {
        status: Some(ContentStatus::Approved.as_str()),
        category_id: query.category_id,
        content_type: kind.map(ContentType::as_str),
        search: query.search.as_deref(),
        ..ContentFilter::default()
    };
    let (rows, total) = content::list_content(conn, filter, ContentOrder::Published, page).await?;
    Ok(page.wrap(render(conn, rows, false).await?, total))
}

/// The acting user's own content, newest first, optionally by status.
///
/// # Errors
/// Returns `Validation` for an unknown status.
pub async fn list_my_content(
    conn: &mut DbConnection,
    actor: &Actor,
    status: Option<&str>,
    page: PageRequest,
) -> ServiceResult<Page<ContentView>> {
    let wanted = status.map(str::parse::<ContentStatus>).transpose()?;
    let filter = ContentFilter {
        status: wanted.map(ContentStatus::as_str),
        author_id: Some(actor.user_id),
        ..ContentFilter::default()
    };
    let (rows, total) = content::list_content(conn, filter, ContentOrder::Created, page).await?;
    Ok(page.wrap(render(conn, rows, false).await?, total))
}

/// Admin: the moderation queue, newest first.
///
/// # Errors
/// Returns `Forbidden` for non-admins.
pub async fn list_pending(
    conn: &mut DbConnection,
    actor: &Actor,
    page: PageRequest,
) -> ServiceResult<Page<ContentView>> {
    authorize(actor, Permissions::REVIEW_QUEUE)?;
    let filter = ContentFilter {
        status: Some(ContentStatus::Pending.as_str()),
        ..ContentFilter::default()
    };
    let (rows, total) = content::list_content(conn, filter, ContentOrder::Created, page).await?;
    Ok(page.wrap(render(conn, rows, false).await?, total))
}

/// Approved content from the actor's subscribed categories, newest first;
/// the most viewed approved content when they follow nothing.
///
/// # Errors
/// Returns any store error.
pub async fn recommendations(
    conn: &mut DbConnection,
    actor: &Actor,
    limit: Option<i64>,
) -> ServiceResult<Vec<ContentView>> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let count = limit
        .unwrap_or(DEFAULT_RECOMMENDATIONS)
        .clamp(1, MAX_RECOMMENDATIONS);
    let followed = subscriptions::subscribed_category_ids(conn, actor.user_id).await?;
    let rows = if followed.is_empty() {
        content::most_viewed(conn, count).await?
    } else {
        content::latest_in_categories(conn, &followed, count).await?
    };
    render(conn, rows, false).await
}

#[cfg(test)]
mod tests;
