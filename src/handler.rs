//! Request boundary.
//!
//! A [`Context`] carries the shared pool, password hasher and runtime
//! [`Settings`]. Component operations run through [`Context::run`], which
//! checks out one pooled connection and runs the request inside a single
//! transaction; their results are turned into a [`Reply`] carrying a
//! [`StatusKind`] and a JSON body.
use std::{fmt, str::FromStr, sync::Arc};

use argon2::Argon2;
use diesel_async::AsyncConnection;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

pub use crate::{error::StatusKind, roles::Actor};
use crate::{
    db::{DbConnection, DbPool, PageRequest},
    error::{ServiceError, ServiceResult},
};

/// Deployment mode controlling how much error detail replies expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Internal error details are returned to callers.
    #[default]
    Development,
    /// Internal error details are logged only.
    Production,
}

impl FromStr for Environment {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ServiceError::validation(format!(
                "invalid environment '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

/// Runtime knobs consumed by component operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Error detail policy.
    pub environment: Environment,
    /// Deepest reply level rendered in comment listings.
    pub comment_depth: usize,
    /// Page size used when the caller gives none.
    pub per_page: i64,
    /// Page size ceiling.
    pub max_per_page: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            comment_depth: 3,
            per_page: 20,
            max_per_page: 100,
        }
    }
}

impl Settings {
    /// Build a page window from caller input using the configured sizes.
    #[must_use]
    pub fn page(&self, page: Option<i64>, per_page: Option<i64>) -> PageRequest {
        PageRequest::new(page, per_page, self.per_page, self.max_per_page)
    }
}

/// Shared state for serving requests.
#[derive(Clone)]
pub struct Context {
    /// Connection pool.
    pub pool: DbPool,
    /// Password hasher shared across requests.
    pub argon2: Arc<Argon2<'static>>,
    /// Runtime settings.
    pub settings: Settings,
}

impl Context {
    /// Bundle the shared request state.
    #[must_use]
    pub const fn new(pool: DbPool, argon2: Arc<Argon2<'static>>, settings: Settings) -> Self {
        Self {
            pool,
            argon2,
            settings,
        }
    }

    /// Check out a connection and run one operation on it inside a
    /// transaction. Any error rolls back every write the operation made.
    ///
    /// # Errors
    /// Returns [`ServiceError::Pool`] when no connection is available, or
    /// whatever the operation returns.
    pub async fn run<T, F>(&self, op: F) -> ServiceResult<T>
    where
        T: Send,
        for<'c> F: FnOnce(&'c mut DbConnection) -> BoxFuture<'c, ServiceResult<T>> + Send,
    {
        let mut pooled = self.pool.get().await.map_err(|err| {
            error!(%err, "failed to get database connection");
            ServiceError::Pool(err.to_string())
        })?;
        let conn: &mut DbConnection = &mut pooled;
        conn.transaction::<_, ServiceError, _>(|conn| Box::pin(op(conn))).await
    }

    /// Convert an operation result into a reply under the configured
    /// environment.
    #[must_use]
    pub fn reply<T: Serialize>(&self, success: StatusKind, result: ServiceResult<T>) -> Reply {
        Reply::from_result(success, result, self.settings.environment)
    }
}

/// Structured response handed back to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Outcome class.
    pub status: StatusKind,
    /// JSON body.
    pub body: Value,
}

impl Reply {
    /// Successful reply carrying `value` as its body.
    #[must_use]
    pub fn success<T: Serialize>(status: StatusKind, value: &T) -> Self {
        serde_json::to_value(value).map_or_else(
            |err| {
                error!(%err, "failed to serialize reply");
                Self::internal(None)
            },
            |body| Self { status, body },
        )
    }

    /// Failure reply for `err`. Infrastructure faults are logged and their
    /// detail is only exposed in development.
    #[must_use]
    pub fn failure(err: &ServiceError, environment: Environment) -> Self {
        if err.is_internal() {
            error!(error = %err, category = err.category(), "operation failed");
            let detail = (environment == Environment::Development).then(|| err.to_string());
            return Self::internal(detail);
        }
        Self {
            status: err.status(),
            body: json!({ "error": err.category(), "message": err.to_string() }),
        }
    }

    fn internal(detail: Option<String>) -> Self {
        let mut body = json!({
            "error": "store_failure",
            "message": "Internal server error",
        });
        if let (Some(text), Some(map)) = (detail, body.as_object_mut()) {
            map.insert("detail".to_owned(), Value::String(text));
        }
        Self {
            status: StatusKind::ServerError,
            body,
        }
    }

    /// Map an operation result to a reply.
    #[must_use]
    pub fn from_result<T: Serialize>(
        success: StatusKind,
        result: ServiceResult<T>,
        environment: Environment,
    ) -> Self {
        result.map_or_else(
            |err| Self::failure(&err, environment),
            |value| Self::success(success, &value),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use diesel::result::Error as DieselError;
    use diesel_async::pooled_connection::{AsyncDieselConnectionManager, bb8::Pool};
    use rstest::rstest;

    use super::*;

    fn dummy_pool() -> DbPool {
        let manager = AsyncDieselConnectionManager::<DbConnection>::new(":memory:");
        Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .test_on_check_out(false)
            .build_unchecked(manager)
    }

    #[tokio::test]
    async fn context_carries_shared_argon2_reference() {
        let argon2 = Arc::new(Argon2::default());
        let ctx = Context::new(dummy_pool(), Arc::clone(&argon2), Settings::default());
        assert!(Arc::ptr_eq(&ctx.argon2, &argon2));
        assert_eq!(ctx.settings.comment_depth, 3);
    }

    #[rstest]
    #[case("production", Environment::Production)]
    #[case(" Development ", Environment::Development)]
    #[case("prod", Environment::Production)]
    fn environment_parses(#[case] text: &str, #[case] expected: Environment) {
        assert_eq!(text.parse::<Environment>().expect("parse"), expected);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn client_errors_keep_their_message() {
        let reply = Reply::failure(&ServiceError::conflict("Already subscribed"), Environment::Production);
        assert_eq!(reply.status, StatusKind::Conflict);
        assert_eq!(reply.body["error"], "conflict");
        assert_eq!(reply.body["message"], "Already subscribed");
    }

    #[rstest]
    #[case(Environment::Development, true)]
    #[case(Environment::Production, false)]
    fn store_detail_depends_on_environment(#[case] env: Environment, #[case] exposed: bool) {
        let err = ServiceError::from(DieselError::RollbackTransaction);
        let reply = Reply::failure(&err, env);
        assert_eq!(reply.status, StatusKind::ServerError);
        assert_eq!(reply.body["message"], "Internal server error");
        assert_eq!(reply.body.get("detail").is_some(), exposed);
    }

    #[test]
    fn success_serializes_value() {
        let reply = Reply::from_result(StatusKind::Created, Ok(json!({"id": 4})), Environment::Production);
        assert_eq!(reply.status, StatusKind::Created);
        assert_eq!(reply.body["id"], 4);
    }

    #[test]
    fn settings_build_clamped_pages() {
        let page = Settings::default().page(Some(2), Some(1000));
        assert_eq!(page.per_page(), 100);
        assert_eq!(page.offset(), 100);
    }
}
