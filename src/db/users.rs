//! User record helpers.

use std::collections::HashMap;

use diesel::{prelude::*, result::QueryResult};
use diesel_async::RunQueryDsl;

use super::{
    connection::{Backend, DbConnection},
    pagination::PageRequest,
};
use crate::{
    models::{NewUser, Role, User, UserChanges},
    schema::users,
};

/// Fetch a user by id.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_user(conn: &mut DbConnection, user_id: i32) -> QueryResult<Option<User>> {
    users::table.find(user_id).first::<User>(conn).await.optional()
}

/// Look up a user record by username.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_user_by_name(conn: &mut DbConnection, name: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(name))
        .first::<User>(conn)
        .await
        .optional()
}

/// Look up a user record by email address.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn get_user_by_email(conn: &mut DbConnection, email: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::email.eq(email))
        .first::<User>(conn)
        .await
        .optional()
}

/// Whether any account holds the admin role.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn admin_exists(conn: &mut DbConnection) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        users::table.filter(users::role.eq(Role::Admin.as_str())),
    ))
    .get_result(conn)
    .await
}

/// Insert a new user record and return the stored row.
///
/// # Errors
/// Returns any error produced by the insertion query.
#[must_use = "handle the result"]
pub async fn create_user(conn: &mut DbConnection, user: &NewUser<'_>) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(user)
        .get_result(conn)
        .await
}

/// Apply `changes` to a user row and return the updated row.
///
/// # Errors
/// Returns [`diesel::result::Error::NotFound`] when the row is absent.
#[must_use = "handle the result"]
pub async fn update_user(
    conn: &mut DbConnection,
    user_id: i32,
    changes: &UserChanges,
) -> QueryResult<User> {
    diesel::update(users::table.find(user_id))
        .set(changes)
        .get_result(conn)
        .await
}

fn filtered<'a>(role: Option<&'a str>, active: Option<bool>) -> users::BoxedQuery<'a, Backend> {
    let mut query = users::table.into_boxed();
    if let Some(wanted) = role {
        query = query.filter(users::role.eq(wanted));
    }
    if let Some(flag) = active {
        query = query.filter(users::is_active.eq(flag));
    }
    query
}

/// List users matching the optional role and active filters, ordered by id.
///
/// Returns the page of rows and the total number of matches.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn list_users(
    conn: &mut DbConnection,
    role: Option<&str>,
    active: Option<bool>,
    page: PageRequest,
) -> QueryResult<(Vec<User>, i64)> {
    let total: i64 = filtered(role, active).count().get_result(conn).await?;
    let rows = filtered(role, active)
        .order(users::id.asc())
        .limit(page.per_page())
        .offset(page.offset())
        .load::<User>(conn)
        .await?;
    Ok((rows, total))
}

/// Map user ids to usernames.
///
/// # Errors
/// Returns any error produced by the underlying database query.
#[must_use = "handle the result"]
pub async fn usernames(conn: &mut DbConnection, ids: &[i32]) -> QueryResult<HashMap<i32, String>> {
    let rows: Vec<(i32, String)> = users::table
        .filter(users::id.eq_any(ids))
        .select((users::id, users::username))
        .load(conn)
        .await?;
    Ok(rows.into_iter().collect())
}
