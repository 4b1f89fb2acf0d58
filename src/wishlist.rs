//! Per-user wishlists of content.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    content::{self as content_ops, ContentView},
    db::{DbConnection, Page, PageRequest, content, wishlists},
    error::{ServiceError, ServiceResult},
    models::{NewWishlist, Wishlist},
    roles::{Actor, Permissions, authorize},
};

/// A saved content item on a user's wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistEntry {
    /// Row id.
    pub id: i32,
    /// Owner of the wishlist.
    pub user_id: i32,
    /// The saved item.
    pub content_id: i32,
    /// Time the item was saved (UTC).
    pub created_at: NaiveDateTime,
    /// The saved item, when it still exists.
    pub content: Option<ContentView>,
}

async fn render(conn: &mut DbConnection, rows: Vec<Wishlist>) -> ServiceResult<Vec<WishlistEntry>> {
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        if let Some(item) = content::get_content(conn, row.content_id).await? {
            items.push(item);
        }
    }
    let mut views: HashMap<i32, ContentView> = content_ops::render(conn, items, false)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    Ok(rows
        .into_iter()
        .map(|w| WishlistEntry {
            content: views.remove(&w.content_id),
            id: w.id,
            user_id: w.user_id,
            content_id: w.content_id,
            created_at: w.created_at,
        })
        .collect())
}

/// Save a content item to the actor's wishlist.
///
/// # Errors
/// Returns `NotFound` for unknown content and `Conflict` when already saved.
pub async fn add_to_wishlist(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
) -> ServiceResult<WishlistEntry> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let user_id = actor.user_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            if content::get_content(conn, content_id).await?.is_none() {
                return Err(ServiceError::not_found("Content not found"));
            }
            if wishlists::find_entry(conn, user_id, content_id).await?.is_some() {
                return Err(ServiceError::conflict("Content already in wishlist"));
            }
            let row = wishlists::create_entry(
                conn,
                &NewWishlist {
                    user_id,
                    content_id,
                    created_at: Utc::now().naive_utc(),
                },
            )
            .await?;
            info!(entry_id = row.id, user_id, content_id, "wishlist entry added");
            render(conn, vec![row])
                .await?
                .pop()
                .ok_or_else(|| ServiceError::not_found("Content not found"))
        })
    })
    .await
}

/// The actor's wishlist, newest first.
///
/// # Errors
/// Returns any store error.
pub async fn list_wishlist(
    conn: &mut DbConnection,
    actor: &Actor,
    page: PageRequest,
) -> ServiceResult<Page<WishlistEntry>> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let (rows, total) = wishlists::list_for_user(conn, actor.user_id, page).await?;
    Ok(page.wrap(render(conn, rows).await?, total))
}

/// Remove an entry from the actor's wishlist.
///
/// # Errors
/// Returns `NotFound` unless the entry belongs to the actor.
pub async fn remove_from_wishlist(
    conn: &mut DbConnection,
    actor: &Actor,
    entry_id: i32,
) -> ServiceResult<()> {
    authorize(actor, Permissions::PARTICIPATE)?;
    if wishlists::delete_owned(conn, entry_id, actor.user_id).await? == 0 {
        return Err(ServiceError::not_found("Wishlist item not found"));
    }
    info!(entry_id, user_id = actor.user_id, "wishlist entry removed");
    Ok(())
}
