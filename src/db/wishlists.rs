//! Wishlist registry helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::{connection::DbConnection, pagination::PageRequest};
use crate::{
    models::{NewWishlist, Wishlist},
    schema::wishlists,
};

/// The wishlist entry `user_id` holds for `content_id`, if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn find_entry(
    conn: &mut DbConnection,
    user_id: i32,
    content_id: i32,
) -> QueryResult<Option<Wishlist>> {
    wishlists::table
        .filter(wishlists::user_id.eq(user_id))
        .filter(wishlists::content_id.eq(content_id))
        .first::<Wishlist>(conn)
        .await
        .optional()
}

/// Insert a wishlist entry and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_entry(conn: &mut DbConnection, entry: &NewWishlist) -> QueryResult<Wishlist> {
    diesel::insert_into(wishlists::table)
        .values(entry)
        .get_result(conn)
        .await
}

/// One page of a user's wishlist, newest first, with the total count.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn list_for_user(
    conn: &mut DbConnection,
    user_id: i32,
    page: PageRequest,
) -> QueryResult<(Vec<Wishlist>, i64)> {
    let total: i64 = wishlists::table
        .filter(wishlists::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .await?;
    let rows = wishlists::table
        .filter(wishlists::user_id.eq(user_id))
        .order((wishlists::created_at.desc(), wishlists::id.desc()))
        .limit(page.per_page())
        .offset(page.offset())
        .load::<Wishlist>(conn)
        .await?;
    Ok((rows, total))
}

/// Delete a wishlist entry owned by `user_id`, returning the rows removed.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_owned(conn: &mut DbConnection, entry_id: i32, user_id: i32) -> QueryResult<usize> {
    diesel::delete(
        wishlists::table
            .filter(wishlists::id.eq(entry_id))
            .filter(wishlists::user_id.eq(user_id)),
    )
    .execute(conn)
    .await
}
