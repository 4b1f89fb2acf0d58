//! Shared helpers for integration tests.

use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use pressroom::{
    accounts::{IdentityTokens, TokenKind},
    db::{DbConnection, establish_pool, open_migrated},
    error::{ServiceError, ServiceResult},
    handler::{Context, Settings},
};
use rstest::fixture;
use tempfile::TempDir;

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

/// Cheap Argon2 parameters so registration stays fast.
pub fn fast_argon2() -> Argon2<'static> {
    let params = Params::new(1024, 1, 1, None).expect("valid params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// A migrated in-memory database connection.
#[fixture]
pub async fn memory_conn() -> DbConnection {
    open_migrated(":memory:")
        .await
        .expect("failed to prepare in-memory database")
}

/// A request context over a pooled, file-backed database. The directory must
/// outlive the context.
pub async fn file_context() -> (TempDir, Context) {
    let dir = TempDir::new().expect("tempdir");
    let url = dir.path().join("pressroom.db").to_string_lossy().into_owned();
    open_migrated(&url).await.expect("failed to prepare database");
    let pool = establish_pool(&url).await.expect("failed to build pool");
    let ctx = Context::new(pool, Arc::new(fast_argon2()), Settings::default());
    (dir, ctx)
}
