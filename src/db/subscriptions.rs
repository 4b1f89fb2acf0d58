//! Subscription registry helpers. Every lookup by row id is scoped to the
//! owning user.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;
use crate::{
    models::{NewSubscription, Subscription},
    schema::subscriptions,
};

/// The subscription `user_id` holds on `category_id`, if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn find_subscription(
    conn: &mut DbConnection,
    user_id: i32,
    category_id: i32,
) -> QueryResult<Option<Subscription>> {
    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .filter(subscriptions::category_id.eq(category_id))
        .first::<Subscription>(conn)
        .await
        .optional()
}

/// Insert a subscription and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_subscription(
    conn: &mut DbConnection,
    sub: &NewSubscription,
) -> QueryResult<Subscription> {
    diesel::insert_into(subscriptions::table)
        .values(sub)
        .get_result(conn)
        .await
}

/// Subscriptions held by a user, oldest first.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn list_for_user(conn: &mut DbConnection, user_id: i32) -> QueryResult<Vec<Subscription>> {
    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .order(subscriptions::id.asc())
        .load::<Subscription>(conn)
        .await
}

/// Update the notification flag of a subscription owned by `user_id`.
///
/// Returns `None` when no such row belongs to the user.
///
/// # Errors
/// Returns any error produced by the update query.
#[must_use = "handle the result"]
pub async fn set_notify(
    conn: &mut DbConnection,
    subscription_id: i32,
    user_id: i32,
    notify: bool,
) -> QueryResult<Option<Subscription>> {
    diesel::update(
        subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::user_id.eq(user_id)),
    )
    .set(subscriptions::notify_on_new_content.eq(notify))
    .get_result(conn)
    .await
    .optional()
}

/// Delete a subscription owned by `user_id`, returning the rows removed.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_owned(
    conn: &mut DbConnection,
    subscription_id: i32,
    user_id: i32,
) -> QueryResult<usize> {
    diesel::delete(
        subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .filter(subscriptions::user_id.eq(user_id)),
    )
    .execute(conn)
    .await
}

/// Users subscribed to `category_id` with new-content notifications on.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn notify_targets(conn: &mut DbConnection, category_id: i32) -> QueryResult<Vec<i32>> {
    subscriptions::table
        .filter(subscriptions::category_id.eq(category_id))
        .filter(subscriptions::notify_on_new_content.eq(true))
        .order(subscriptions::user_id.asc())
        .select(subscriptions::user_id)
        .load(conn)
        .await
}

/// Category ids a user subscribes to.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn subscribed_category_ids(conn: &mut DbConnection, user_id: i32) -> QueryResult<Vec<i32>> {
    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .select(subscriptions::category_id)
        .load(conn)
        .await
}
