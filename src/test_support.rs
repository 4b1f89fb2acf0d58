//! Fixtures shared by the in-crate service tests.

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use rstest::fixture;

use crate::{
    accounts::{IdentityTokens, TokenKind},
    db::{DbConnection, categories, open_migrated, users},
    error::{ServiceError, ServiceResult},
    models::{NewCategory, NewUser, Role},
    roles::Actor,
};

#[fixture]
pub async fn migrated_conn() -> DbConnection {
    open_migrated(":memory:")
        .await
        .expect("failed to prepare in-memory database")
}

pub fn fast_argon2() -> Argon2<'static> {
    let params = Params::new(1024, 1, 1, None).expect("valid params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Tokens of the form `access:<id>` / `refresh:<id>`.
pub struct PlainTokens;

impl IdentityTokens for PlainTokens {
    fn issue(&self, user_id: i32, kind: TokenKind) -> ServiceResult<String> {
        let prefix = match kind {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        };
        Ok(format!("{prefix}:{user_id}"))
    }

    fn verify(&self, token: &str) -> ServiceResult<i32> {
        token
            .split_once(':')
            .and_then(|(_, id)| id.parse().ok())
            .ok_or_else(|| ServiceError::Authentication("Invalid token".to_owned()))
    }
}

pub async fn seed_actor(conn: &mut DbConnection, name: &str, role: Role) -> Actor {
    let now = Utc::now().naive_utc();
    let email = format!("{name}@example.com");
    let user = users::create_user(
        conn,
        &NewUser {
            username: name,
            email: &email,
            password_hash: "unused",
            role: role.as_str(),
            is_active: true,
            profile_data: "{}",
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("failed to seed user");
    Actor::new(user.id, role)
}

pub async fn seed_category(conn: &mut DbConnection, owner: &Actor, name: &str) -> i32 {
    let now = Utc::now().naive_utc();
    let slug = name.to_lowercase().replace(' ', "-");
    categories::create_category(
        conn,
        &NewCategory {
            name,
            description: None,
            slug: &slug,
            created_by: owner.user_id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("failed to seed category")
    .id
}
