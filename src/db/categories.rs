//! Category record helpers.

use std::collections::HashMap;

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::connection::DbConnection;
use crate::{
    models::{Category, CategoryChanges, NewCategory},
    schema::{categories, content},
};

/// Insert a new category and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_category(
    conn: &mut DbConnection,
    cat: &NewCategory<'_>,
) -> QueryResult<Category> {
    diesel::insert_into(categories::table)
        .values(cat)
        .get_result(conn)
        .await
}

/// Fetch a category by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_category(conn: &mut DbConnection, category_id: i32) -> QueryResult<Option<Category>> {
    categories::table
        .find(category_id)
        .first::<Category>(conn)
        .await
        .optional()
}

/// Fetch a category whose name or slug matches.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn find_category_by_name_or_slug(
    conn: &mut DbConnection,
    name: &str,
    slug: &str,
) -> QueryResult<Option<Category>> {
    categories::table
        .filter(categories::name.eq(name).or(categories::slug.eq(slug)))
        .first::<Category>(conn)
        .await
        .optional()
}

/// All categories ordered by name.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn list_categories(conn: &mut DbConnection) -> QueryResult<Vec<Category>> {
    categories::table
        .order(categories::name.asc())
        .load::<Category>(conn)
        .await
}

/// Categories with the given ids, in no particular order.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn categories_by_ids(conn: &mut DbConnection, ids: &[i32]) -> QueryResult<Vec<Category>> {
    categories::table
        .filter(categories::id.eq_any(ids))
        .load::<Category>(conn)
        .await
}

/// Number of content rows filed under each of the given categories.
///
/// Categories without content are absent from the map.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn content_counts(
    conn: &mut DbConnection,
    ids: &[i32],
) -> QueryResult<HashMap<i32, i64>> {
    let rows: Vec<(i32, i64)> = content::table
        .filter(content::category_id.eq_any(ids))
        .group_by(content::category_id)
        .select((content::category_id, diesel::dsl::count_star()))
        .load(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Apply `changes` to a category row and return the updated row.
///
/// # Errors
/// Returns [`diesel::result::Error::NotFound`] when the row is absent.
#[must_use = "handle the result"]
pub async fn update_category(
    conn: &mut DbConnection,
    category_id: i32,
    changes: &CategoryChanges,
) -> QueryResult<Category> {
    diesel::update(categories::table.find(category_id))
        .set(changes)
        .get_result(conn)
        .await
}

/// Delete a category row, returning the number of rows removed.
///
/// # Errors
/// Returns any error produced by the deletion query.
#[must_use = "handle the result"]
pub async fn delete_category(conn: &mut DbConnection, category_id: i32) -> QueryResult<usize> {
    diesel::delete(categories::table.find(category_id))
        .execute(conn)
        .await
}
