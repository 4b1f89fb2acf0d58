//! Content record helpers.

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::{
    connection::{Backend, DbConnection},
    pagination::PageRequest,
};
use crate::{
    models::{Content, ContentChanges, ContentStatus, NewContent},
    schema::{comments, content, content_reviews, wishlists},
};

/// Predicates for content listings. Unset fields do not filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilter<'a> {
    /// Exact status match.
    pub status: Option<&'a str>,
    /// Restrict to one author.
    pub author_id: Option<i32>,
    /// Restrict to one category.
    pub category_id: Option<i32>,
    /// Exact content type match.
    pub content_type: Option<&'a str>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<&'a str>,
}

/// Sort order for content listings. Ties break on id, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrder {
    /// Most recently published first.
    Published,
    /// Most recently created first.
    Created,
    /// Most viewed first.
    Views,
}

fn filtered<'a>(filter: ContentFilter<'a>) -> content::BoxedQuery<'a, Backend> {
    let mut query = content::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(content::status.eq(status));
    }
    if let Some(author) = filter.author_id {
        query = query.filter(content::author_id.eq(author));
    }
    if let Some(category) = filter.category_id {
        query = query.filter(content::category_id.eq(category));
    }
    if let Some(kind) = filter.content_type {
        query = query.filter(content::content_type.eq(kind));
    }
    if let Some(term) = filter.search.filter(|s| !s.is_empty()) {
        let pattern = format!("%{term}%");
        // SQLite LIKE folds ASCII case.
        #[cfg(feature = "sqlite")]
        {
            query = query.filter(
                content::title
                    .nullable()
                    .like(pattern.clone())
                    .or(content::description.like(pattern)),
            );
        }
        #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
        {
            use diesel::pg::PgTextExpressionMethods;
            query = query.filter(
                content::title
                    .nullable()
                    .ilike(pattern.clone())
                    .or(content::description.ilike(pattern)),
            );
        }
    }
    query
}

fn ordered<'a>(
    query: content::BoxedQuery<'a, Backend>,
    order: ContentOrder,
) -> content::BoxedQuery<'a, Backend> {
    let primary = match order {
        ContentOrder::Published => query.order(content::published_at.desc()),
        ContentOrder::Created => query.order(content::created_at.desc()),
        ContentOrder::Views => query.order(content::views_count.desc()),
    };
    primary.then_order_by(content::id.desc())
}

/// Insert a content row and return it.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_content(conn: &mut DbConnection, item: &NewContent<'_>) -> QueryResult<Content> {
    diesel::insert_into(content::table)
        .values(item)
        .get_result(conn)
        .await
}

/// Fetch a content row by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_content(conn: &mut DbConnection, content_id: i32) -> QueryResult<Option<Content>> {
    content::table
        .find(content_id)
        .first::<Content>(conn)
        .await
        .optional()
}

/// Apply `changes` to a content row and return the updated row.
///
/// # Errors
/// Returns [`diesel::result::Error::NotFound`] when the row is absent.
#[must_use = "handle the result"]
pub async fn update_content(
    conn: &mut DbConnection,
    content_id: i32,
    changes: &ContentChanges,
) -> QueryResult<Content> {
    diesel::update(content::table.find(content_id))
        .set(changes)
        .get_result(conn)
        .await
}

/// Bump the view counter of a content row and return the updated row.
///
/// # Errors
/// Returns any error produced by the update query.
#[must_use = "handle the result"]
pub async fn increment_views(conn: &mut DbConnection, content_id: i32) -> QueryResult<Content> {
    diesel::update(content::table.find(content_id))
        .set(content::views_count.eq(content::views_count + 1))
        .get_result(conn)
        .await
}

/// Overwrite the like and dislike counters.
///
/// # Errors
/// Returns any error produced by the update query.
#[must_use = "handle the result"]
pub async fn set_review_counts(
    conn: &mut DbConnection,
    content_id: i32,
    likes: i32,
    dislikes: i32,
) -> QueryResult<Content> {
    diesel::update(content::table.find(content_id))
        .set((
            content::likes_count.eq(likes),
            content::dislikes_count.eq(dislikes),
        ))
        .get_result(conn)
        .await
}

/// Delete a content row together with its comments, reviews and wishlist
/// entries. Callers run this inside a transaction.
///
/// Returns the number of content rows removed (0 or 1).
///
/// # Errors
/// Returns any error produced by the deletion queries.
#[must_use = "handle the result"]
pub async fn delete_content_cascade(conn: &mut DbConnection, content_id: i32) -> QueryResult<usize> {
    diesel::delete(content_reviews::table.filter(content_reviews::content_id.eq(content_id)))
        .execute(conn)
        .await?;
    diesel::delete(wishlists::table.filter(wishlists::content_id.eq(content_id)))
        .execute(conn)
        .await?;
    diesel::delete(comments::table.filter(comments::content_id.eq(content_id)))
        .execute(conn)
        .await?;
    diesel::delete(content::table.find(content_id))
        .execute(conn)
        .await
}

/// List content matching `filter`, returning one page and the total count.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn list_content(
    conn: &mut DbConnection,
    filter: ContentFilter<'_>,
    order: ContentOrder,
    page: PageRequest,
) -> QueryResult<(Vec<Content>, i64)> {
    let total: i64 = filtered(filter).count().get_result(conn).await?;
    let rows = ordered(filtered(filter), order)
        .limit(page.per_page())
        .offset(page.offset())
        .load::<Content>(conn)
        .await?;
    Ok((rows, total))
}

/// Approved content from any of `category_ids`, newest first.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn latest_in_categories(
    conn: &mut DbConnection,
    category_ids: &[i32],
    limit: i64,
) -> QueryResult<Vec<Content>> {
    let approved = ContentFilter {
        status: Some(ContentStatus::Approved.as_str()),
        ..ContentFilter::default()
    };
    ordered(filtered(approved), ContentOrder::Published)
        .filter(content::category_id.eq_any(category_ids.to_vec()))
        .limit(limit)
        .load::<Content>(conn)
        .await
}

/// The most viewed approved content.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn most_viewed(conn: &mut DbConnection, limit: i64) -> QueryResult<Vec<Content>> {
    let approved = ContentFilter {
        status: Some(ContentStatus::Approved.as_str()),
        ..ContentFilter::default()
    };
    ordered(filtered(approved), ContentOrder::Views)
        .limit(limit)
        .load::<Content>(conn)
        .await
}

/// Number of content rows filed under a category.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn count_in_category(conn: &mut DbConnection, category_id: i32) -> QueryResult<i64> {
    content::table
        .filter(content::category_id.eq(category_id))
        .count()
        .get_result(conn)
        .await
}
