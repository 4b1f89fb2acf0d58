//! Like/dislike reviews.
//!
//! A user holds at most one review per content item. Every change recounts
//! the item's review rows and overwrites its like and dislike counters, so the
//! counters never drift from the rows they summarise.

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    db::{DbConnection, content, reviews},
    error::{ServiceError, ServiceResult},
    models::{ContentReview, NewContentReview, ReviewType},
    roles::{Actor, Permissions, authorize},
};

/// A user's review of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    /// Row id.
    pub id: i32,
    /// The reviewed item.
    pub content_id: i32,
    /// The reviewing user.
    pub user_id: i32,
    /// `like` or `dislike`.
    pub review_type: String,
    /// First review time (UTC).
    pub created_at: NaiveDateTime,
    /// Last change time (UTC).
    pub updated_at: NaiveDateTime,
}

impl From<ContentReview> for ReviewView {
    fn from(r: ContentReview) -> Self {
        Self {
            id: r.id,
            content_id: r.content_id,
            user_id: r.user_id,
            review_type: r.review_type,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Counters of a content item after a review change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewTotals {
    /// Likes after the change.
    pub likes_count: i32,
    /// Dislikes after the change.
    pub dislikes_count: i32,
}

/// The stored review together with the recounted totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    /// The stored review.
    pub review: ReviewView,
    /// Recounted totals, flattened into the outcome.
    #[serde(flatten)]
    pub totals: ReviewTotals,
}

fn clamp_count(n: i64) -> i32 { i32::try_from(n).unwrap_or(i32::MAX) }

async fn recount(conn: &mut DbConnection, content_id: i32) -> ServiceResult<ReviewTotals> {
    let (likes, dislikes) = reviews::tally(conn, content_id).await?;
    let row = content::set_review_counts(conn, content_id, clamp_count(likes), clamp_count(dislikes))
        .await?;
    Ok(ReviewTotals {
        likes_count: row.likes_count,
        dislikes_count: row.dislikes_count,
    })
}

/// Record or replace the actor's review of a content item.
///
/// # Errors
/// Returns `Validation` for an unknown review type, `NotFound` for unknown
/// content and `Conflict` if a concurrent submission won the insert.
pub async fn submit_review(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
    review_type: &str,
) -> ServiceResult<ReviewOutcome> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let kind: ReviewType = review_type
        .parse()
        .map_err(|_| ServiceError::validation("Invalid review type"))?;
    let user_id = actor.user_id;
    let outcome = conn
        .transaction::<_, ServiceError, _>(|conn| {
            Box::pin(async move {
                if content::get_content(conn, content_id).await?.is_none() {
                    return Err(ServiceError::not_found("Content not found"));
                }
                let ts: NaiveDateTime = Utc::now().naive_utc();
                let review = match reviews::find_review(conn, content_id, user_id).await? {
                    Some(existing) => reviews::set_review_type(conn, existing.id, kind, ts).await?,
                    None => {
                        reviews::create_review(
                            conn,
                            &NewContentReview {
                                content_id,
                                user_id,
                                review_type: kind.as_str(),
                                created_at: ts,
                                updated_at: ts,
                            },
                        )
                        .await?
                    }
                };
                let totals = recount(conn, content_id).await?;
                Ok(ReviewOutcome {
                    review: review.into(),
                    totals,
                })
            })
        })
        .await?;
    info!(content_id, user_id, review_type = %kind, "review recorded");
    Ok(outcome)
}

/// Remove the actor's review of a content item.
///
/// # Errors
/// Returns `NotFound` when the actor has no review on the item.
pub async fn remove_review(
    conn: &mut DbConnection,
    actor: &Actor,
    content_id: i32,
) -> ServiceResult<ReviewTotals> {
    authorize(actor, Permissions::PARTICIPATE)?;
    let user_id = actor.user_id;
    let totals = conn
        .transaction::<_, ServiceError, _>(|conn| {
            Box::pin(async move {
                let review = reviews::find_review(conn, content_id, user_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Review not found"))?;
                reviews::delete_review(conn, review.id).await?;
                recount(conn, content_id).await
            })
        })
        .await?;
    info!(content_id, user_id, "review removed");
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        content::{ContentInput, create_content},
        db::reviews as review_rows,
        error::StatusKind,
        models::Role,
        test_support::{migrated_conn, seed_actor, seed_category},
    };

    async fn seed_item(conn: &mut DbConnection, author: &Actor) -> i32 {
        let cat = seed_category(conn, author, "Rust").await;
        create_content(
            conn,
            author,
            ContentInput {
                title: "Post".into(),
                content_type: "audio".into(),
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
    async fn second_review_replaces_first(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let admin = seed_actor(&mut conn, "root", Role::Admin).await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let item = seed_item(&mut conn, &admin).await;

        let liked = submit_review(&mut conn, &user, item, "like")
            .await
            .expect("like");
        assert_eq!(liked.totals, ReviewTotals { likes_count: 1, dislikes_count: 0 });
        let disliked = submit_review(&mut conn, &user, item, "dislike")
            .await
            .expect("dislike");
        assert_eq!(disliked.review.id, liked.review.id);
        assert_eq!(disliked.totals, ReviewTotals { likes_count: 0, dislikes_count: 1 });

        let (likes, dislikes) = review_rows::tally(&mut conn, item).await.expect("tally");
        assert_eq!((likes, dislikes), (0, 1));
    }

    #[rstest]
    #[tokio::test]
    async fn counters_follow_removals(#[future] migrated_conn: DbConnection) {
        let mut conn = migrated_conn.await;
        let admin = seed_actor(&mut conn, "root", Role::Admin).await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let item = seed_item(&mut conn, &admin).await;
        submit_review(&mut conn, &admin, item, "like").await.expect("like");
        submit_review(&mut conn, &user, item, "like").await.expect("like");

        let totals = remove_review(&mut conn, &user, item).await.expect("remove");
        assert_eq!(totals.likes_count, 1);
        let err = remove_review(&mut conn, &user, item)
            .await
            .expect_err("already removed");
        assert_eq!(err.to_string(), "Review not found");
    }

    #[rstest]
    #[case("love", StatusKind::BadRequest)]
    #[case("like", StatusKind::NotFound)]
    #[tokio::test]
    async fn rejects_bad_input(
        #[future] migrated_conn: DbConnection,
        #[case] kind: &str,
        #[case] status: StatusKind,
    ) {
        let mut conn = migrated_conn.await;
        let user = seed_actor(&mut conn, "user", Role::User).await;
        let err = submit_review(&mut conn, &user, 42, kind)
            .await
            .expect_err("rejected");
        assert_eq!(err.status(), status);
    }
}
