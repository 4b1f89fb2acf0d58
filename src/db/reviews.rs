//! Content review helpers.

use chrono::NaiveDateTime;
use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;
use crate::{
    models::{ContentReview, NewContentReview, ReviewType},
    schema::content_reviews,
};

/// The review `user_id` left on `content_id`, if any.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn find_review(
    conn: &mut DbConnection,
    content_id: i32,
    user_id: i32,
) -> QueryResult<Option<ContentReview>> {
    content_reviews::table
        .filter(content_reviews::content_id.eq(content_id))
        .filter(content_reviews::user_id.eq(user_id))
        .first::<ContentReview>(conn)
        .await
        .optional()
}

/// Insert a review and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query, including a unique
/// violation when the user already reviewed the content.
#[must_use = "handle the result"]
pub async fn create_review(
    conn: &mut DbConnection,
    review: &NewContentReview<'_>,
) -> QueryResult<ContentReview> {
    diesel::insert_into(content_reviews::table)
        .values(review)
        .get_result(conn)
        .await
}

/// Overwrite the type of an existing review.
///
/// # Errors
/// Returns [`diesel::result::Error::NotFound`] when the row is absent.
#[must_use = "handle the result"]
pub async fn set_review_type(
    conn: &mut DbConnection,
    review_id: i32,
    review_type: ReviewType,
    now: NaiveDateTime,
) -> QueryResult<ContentReview> {
    diesel::update(content_reviews::table.find(review_id))
        .set((
            content_reviews::review_type.eq(review_type.as_str()),
            content_reviews::updated_at.eq(now),
        ))
        .get_result(conn)
        .await
}

/// Delete a review row.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_review(conn: &mut DbConnection, review_id: i32) -> QueryResult<usize> {
    diesel::delete(content_reviews::table.find(review_id))
        .execute(conn)
        .await
}

/// Count the current reviews on a content item as `(likes, dislikes)`.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn tally(conn: &mut DbConnection, content_id: i32) -> QueryResult<(i64, i64)> {
    let rows: Vec<(String, i64)> = content_reviews::table
        .filter(content_reviews::content_id.eq(content_id))
        .group_by(content_reviews::review_type)
        .select((content_reviews::review_type, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    Ok(rows.into_iter().fold((0, 0), |(likes, dislikes), (kind, n)| {
        match kind.parse::<ReviewType>() {
            Ok(ReviewType::Like) => (likes + n, dislikes),
            Ok(ReviewType::Dislike) => (likes, dislikes + n),
            Err(_) => (likes, dislikes),
        }
    }))
}
