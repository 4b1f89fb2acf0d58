//! Category subscriptions.
//!
//! Rows are addressed by `(id, user_id)` so a user can only touch their own.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    content::CategoryRef,
    db::{DbConnection, categories, subscriptions},
    error::{ServiceError, ServiceResult},
    models::{NewSubscription, Subscription},
    roles::{Actor, Permissions, authorize},
};

/// Public view of a category subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    /// Row id.
    pub id: i32,
    /// The subscriber.
    pub user_id: i32,
    /// The followed category.
    pub category: CategoryRef,
    /// Whether new approvals in the category raise a notice.
    pub notify_on_new_content: bool,
    /// Subscription time (UTC).
    pub created_at: NaiveDateTime,
}

async fn render(
    conn: &mut DbConnection,
    rows: Vec<Subscription>,
) -> ServiceResult<Vec<SubscriptionView>> {
    let ids: Vec<i32> = rows.iter().map(|s| s.category_id).collect();
    let cats: HashMap<i32, CategoryRef> = categories::categories_by_ids(conn, &ids)
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
    Ok(rows
        .into_iter()
        .filter_map(|s| {
            let category = cats.get(&s.category_id).cloned()?;
            Some(SubscriptionView {
                id: s.id,
                user_id: s.user_id,
                category,
                notify_on_new_content: s.notify_on_new_content,
                created_at: s.created_at,
            })
        })
        .collect())
}

async fn render_one(conn: &mut DbConnection, row: Subscription) -> ServiceResult<SubscriptionView> {
    render(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::not_found("Category not found"))
}

/// Subscribe the actor to a category. Notifications default to on.
///
/// # Errors
/// Returns `NotFound` for an unknown category and `Conflict` when already
/// subscribed.
pub async fn subscribe(
    conn: &mut DbConnection,
    actor: &Actor,
    category_id: i32,
    notify_on_new_content: Option<bool>,
) -> ServiceResult<SubscriptionView> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let user_id = actor.user_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            if categories::get_category(conn, category_id).await?.is_none() {
                return Err(ServiceError::not_found("Category not found"));
            }
            if subscriptions::find_subscription(conn, user_id, category_id)
                .await?
                .is_some()
            {
                return Err(ServiceError::conflict("Already subscribed to this category"));
            }
            let row = subscriptions::create_subscription(
                conn,
                &NewSubscription {
                    user_id,
                    category_id,
                    notify_on_new_content: notify_on_new_content.unwrap_or(true),
                    created_at: Utc::now().naive_utc(),
                },
            )
            .await?;
            info!(subscription_id = row.id, user_id, category_id, "subscribed");
            render_one(conn, row).await
        })
    })
    .await
}

/// The actor's subscriptions, oldest first.
///
/// # Errors
/// Returns any store error.
pub async fn list_subscriptions(
    conn: &mut DbConnection,
    actor: &Actor,
) -> ServiceResult<Vec<SubscriptionView>> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let rows = subscriptions::list_for_user(conn, actor.user_id).await?;
    render(conn, rows).await
}

/// Turn new-content notifications on or off for one of the actor's
/// subscriptions.
///
/// # Errors
/// Returns `NotFound` unless the subscription belongs to the actor.
pub async fn update_subscription(
    conn: &mut DbConnection,
    actor: &Actor,
    subscription_id: i32,
    notify_on_new_content: bool,
) -> ServiceResult<SubscriptionView> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let user_id = actor.user_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let row = subscriptions::set_notify(conn, subscription_id, user_id, notify_on_new_content)
                .await?
                .ok_or_else(|| ServiceError::not_found("Subscription not found"))?;
            info!(subscription_id, user_id, notify_on_new_content, "subscription updated");
            render_one(conn, row).await
        })
    })
    .await
}

/// Remove one of the actor's subscriptions.
///
/// # Errors
/// Returns `NotFound` unless the subscription belongs to the actor.
pub async fn unsubscribe(
    conn: &mut DbConnection,
    actor: &Actor,
    subscription_id: i32,
) -> ServiceResult<()> {
    authorize(actor, Permissions::PARTICIPATE)?;
    if subscriptions::delete_owned(conn, subscription_id, actor.user_id).await? == 0 {
        return Err(ServiceError::not_found("Subscription not found"));
    }
    info!(subscription_id, user_id = actor.user_id, "unsubscribed");
    Ok(())
}
