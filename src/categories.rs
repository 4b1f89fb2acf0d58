//! Category management.

use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::info;

use crate::{
    db::{DbConnection, categories, content},
    error::{ServiceError, ServiceResult},
    models::{Category, CategoryChanges, NewCategory},
    roles::{Actor, Permissions, authorize},
};

/// Derive a URL slug from a category name: lowercase, with spaces and
/// underscores turned into hyphens.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .collect()
}

/// Public view of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    /// Row id.
    pub id: i32,
    /// Display name, unique.
    pub name: String,
    /// Optional blurb.
    pub description: Option<String>,
    /// URL-safe identifier, unique.
    pub slug: String,
    /// Id of the creating user.
    pub created_by: i32,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
    /// Last modification time (UTC).
    pub updated_at: NaiveDateTime,
    /// Number of content items filed under the category.
    pub content_count: i64,
}

impl CategoryView {
    fn new(cat: Category, content_count: i64) -> Self {
        Self {
            id: cat.id,
            name: cat.name,
            description: cat.description,
            slug: cat.slug,
            created_by: cat.created_by,
            created_at: cat.created_at,
            updated_at: cat.updated_at,
            content_count,
        }
    }
}

/// Input for a new category.
#[derive(Debug, Clone, Default)]
pub struct CategoryInput {
    /// Display name; must be unique.
    pub name: String,
    /// Optional blurb.
    pub description: Option<String>,
    /// Explicit slug; derived from the name when absent or blank.
    pub slug: Option<String>,
}

/// Edits to a category; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    /// New display name; the slug follows it.
    pub name: Option<String>,
    /// New blurb.
    pub description: Option<String>,
}

async fn view(conn: &mut DbConnection, cat: Category) -> ServiceResult<CategoryView> {
    let count = content::count_in_category(conn, cat.id).await?;
    Ok(CategoryView::new(cat, count))
}

/// Create a category.
///
/// # Errors
/// Returns `Forbidden` for plain users, `Validation` for a blank name and
/// `Conflict` when the name or slug is taken.
pub async fn create_category(
    conn: &mut DbConnection,
    actor: &Actor,
    input: CategoryInput,
) -> ServiceResult<CategoryView> {
    authorize(actor, Permissions::CREATE_CATEGORY)?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Category name is required"));
    }
    let slug = input
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| slugify(name), str::to_owned);
    let description = input.description.as_deref();
    let created_by = actor.user_id;
    let cat = conn
        .transaction::<_, ServiceError, _>(|conn| {
            Box::pin(async move {
                if categories::find_category_by_name_or_slug(conn, name, &slug)
                    .await?
                    .is_some()
                {
                    return Err(ServiceError::conflict("Category already exists"));
                }
                let now = Utc::now().naive_utc();
                Ok(categories::create_category(
                    conn,
                    &NewCategory {
                        name,
                        description,
                        slug: &slug,
                        created_by,
                        created_at: now,
                        updated_at: now,
                    },
                )
                .await?)
            })
        })
        .await?;
    info!(category_id = cat.id, slug = %cat.slug, by = created_by, "category created");
    Ok(CategoryView::new(cat, 0))
}

/// All categories ordered by name, each with its content count.
///
/// # Errors
/// Returns any store error.
pub async fn list_categories(conn: &mut DbConnection) -> ServiceResult<Vec<CategoryView>> {
    let rows = categories::list_categories(conn).await?;
    let ids: Vec<i32> = rows.iter().map(|c| c.id).collect();
    let counts = categories::content_counts(conn, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|c| {
            let n = counts.get(&c.id).copied().unwrap_or(0);
            CategoryView::new(c, n)
        })
        .collect())
}

/// One category.
///
/// # Errors
/// Returns `NotFound` for unknown ids.
pub async fn get_category(conn: &mut DbConnection, category_id: i32) -> ServiceResult<CategoryView> {
    let cat = categories::get_category(conn, category_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Category not found"))?;
    view(conn, cat).await
}

/// Admin: rename or re-describe a category. Renaming re-derives the slug.
///
/// # Errors
/// Returns `Forbidden` for non-admins, `NotFound` for unknown ids and
/// `Conflict` when the new name or slug belongs to another category.
pub async fn update_category(
    conn: &mut DbConnection,
    actor: &Actor,
    category_id: i32,
    update: CategoryUpdate,
) -> ServiceResult<CategoryView> {
    authorize(actor, Permissions::MANAGE_CATEGORIES)?;
    let name = update.name.map(|n| n.trim().to_owned());
    if name.as_deref().is_some_and(str::is_empty) {
        return Err(ServiceError::validation("Category name is required"));
    }
    let description = update.description;
    let actor_id = actor.user_id;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            let current = categories::get_category(conn, category_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Category not found"))?;
            let slug = name.as_deref().map(slugify);
            if let (Some(n), Some(s)) = (name.as_deref(), slug.as_deref()) {
                let clash = categories::find_category_by_name_or_slug(conn, n, s).await?;
                if clash.is_some_and(|c| c.id != current.id) {
                    return Err(ServiceError::conflict("Category name already exists"));
                }
            }
            let changes = CategoryChanges {
                name,
                slug,
                description: description.map(Some),
                updated_at: Some(Utc::now().naive_utc()),
            };
            let cat = categories::update_category(conn, category_id, &changes).await?;
            info!(category_id, by = actor_id, "category updated");
            view(conn, cat).await
        })
    })
    .await
}

/// Admin: delete an empty category.
///
/// # Errors
/// Returns `Forbidden` for non-admins, `NotFound` for unknown ids and
/// `Validation` while the category still holds content.
pub async fn delete_category(
    conn: &mut DbConnection,
    actor: &Actor,
    category_id: i32,
) -> ServiceResult<()> {
    authorize(actor, Permissions::MANAGE_CATEGORIES)?;
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            if categories::get_category(conn, category_id).await?.is_none() {
                return Err(ServiceError::not_found("Category not found"));
            }
            if content::count_in_category(conn, category_id).await? > 0 {
                return Err(ServiceError::validation(
                    "Cannot delete category with existing content",
                ));
            }
            categories::delete_category(conn, category_id).await?;
            Ok(())
        })
    })
    .await?;
    info!(category_id, by = actor.user_id, "category deleted");
    Ok(())
}
