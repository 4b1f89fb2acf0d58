//! Comment record helpers.

use std::collections::HashMap;

use cfg_if::cfg_if;
use chrono::NaiveDateTime;
use diesel::{prelude::*, result::QueryResult, sql_query, sql_types::Integer};
use diesel_async::RunQueryDsl;
use diesel_cte_ext::{RecursiveCTEExt, RecursiveParts};

use super::connection::DbConnection;
use crate::{
    models::{Comment, NewComment},
    schema::comments,
};

/// Insert a comment and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_comment(conn: &mut DbConnection, comment: &NewComment<'_>) -> QueryResult<Comment> {
    diesel::insert_into(comments::table)
        .values(comment)
        .get_result(conn)
        .await
}

/// Fetch a comment by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_comment(conn: &mut DbConnection, comment_id: i32) -> QueryResult<Option<Comment>> {
    comments::table
        .find(comment_id)
        .first::<Comment>(conn)
        .await
        .optional()
}

/// Every comment on a content item, newest first.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn comments_for_content(
    conn: &mut DbConnection,
    content_id: i32,
) -> QueryResult<Vec<Comment>> {
    comments::table
        .filter(comments::content_id.eq(content_id))
        .order((comments::created_at.desc(), comments::id.desc()))
        .load::<Comment>(conn)
        .await
}

/// Comment totals per content item. Items without comments are absent.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn counts_for_content(
    conn: &mut DbConnection,
    content_ids: &[i32],
) -> QueryResult<HashMap<i32, i64>> {
    let rows: Vec<(i32, i64)> = comments::table
        .filter(comments::content_id.eq_any(content_ids))
        .group_by(comments::content_id)
        .select((comments::content_id, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Number of direct replies to each of the given comments.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn reply_counts(
    conn: &mut DbConnection,
    parent_ids: &[i32],
) -> QueryResult<HashMap<i32, i64>> {
    let rows: Vec<(Option<i32>, i64)> = comments::table
        .filter(comments::parent_comment_id.eq_any(parent_ids))
        .group_by(comments::parent_comment_id)
        .select((comments::parent_comment_id, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(parent, n)| parent.map(|p| (p, n)))
        .collect())
}

/// Replace the text of a comment and return the updated row.
///
/// # Errors
/// Returns [`diesel::result::Error::NotFound`] when the row is absent.
#[must_use = "handle the result"]
pub async fn update_comment_text(
    conn: &mut DbConnection,
    comment_id: i32,
    text: &str,
    now: NaiveDateTime,
) -> QueryResult<Comment> {
    diesel::update(comments::table.find(comment_id))
        .set((comments::comment_text.eq(text), comments::updated_at.eq(now)))
        .get_result(conn)
        .await
}

cfg_if! {
    if #[cfg(feature = "postgres")] {
        const THREAD_SEED_SQL: &str =
            "SELECT id, 1 AS depth FROM comments WHERE parent_comment_id = $1";
    } else {
        const THREAD_SEED_SQL: &str =
            "SELECT id, 1 AS depth FROM comments WHERE parent_comment_id = ?";
    }
}

const THREAD_STEP_SQL: &str = concat!(
    "SELECT c.id AS id, thread.depth + 1 AS depth\n",
    "FROM comments c\n",
    "JOIN thread ON c.parent_comment_id = thread.id"
);
const THREAD_BODY_SQL: &str = "SELECT id FROM thread ORDER BY depth, id";

/// Ids of every reply below `root`, at any depth, in breadth-first order.
///
/// The walk is a single recursive query over `parent_comment_id`.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn descendant_ids(conn: &mut DbConnection, root: i32) -> QueryResult<Vec<i32>> {
    #[derive(QueryableByName)]
    struct Node {
        #[diesel(sql_type = Integer)]
        id: i32,
    }

    let seed = sql_query(THREAD_SEED_SQL).bind::<Integer, _>(root);
    let step = sql_query(THREAD_STEP_SQL);
    let body = sql_query(THREAD_BODY_SQL);
    let query = conn.with_recursive(
        "thread",
        &["id", "depth"],
        RecursiveParts::new(seed, step, body),
    );
    let nodes: Vec<Node> = query.load(conn).await?;
    Ok(nodes.into_iter().map(|n| n.id).collect())
}

/// Fetch the given comments in one query, keyed by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn comments_by_ids(
    conn: &mut DbConnection,
    ids: &[i32],
) -> QueryResult<HashMap<i32, Comment>> {
    let rows: Vec<Comment> = comments::table
        .filter(comments::id.eq_any(ids))
        .load(conn)
        .await?;
    Ok(rows.into_iter().map(|c| (c.id, c)).collect())
}

/// Delete the given comments, returning the number removed.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_comments(conn: &mut DbConnection, ids: &[i32]) -> QueryResult<usize> {
    diesel::delete(comments::table.filter(comments::id.eq_any(ids)))
        .execute(conn)
        .await
}
