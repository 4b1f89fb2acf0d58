//! Accounts: registration, login, profiles and admin user management.

use argon2::Argon2;
use chrono::{NaiveDateTime, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    db::{DbConnection, Page, PageRequest, users},
    error::{ServiceError, ServiceResult},
    models::{NewUser, Role, User, UserChanges},
    notifications::{self, Notified},
    roles::{Actor, Permissions, authorize},
    users::{hash_password, is_valid_email, validate_username, verify_password},
};

/// Which token a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token exchanged for new access tokens.
    Refresh,
}

/// Issues and verifies identity tokens. Implemented by the transport layer.
pub trait IdentityTokens: Send + Sync {
    /// Issue a token of `kind` for `user_id`.
    ///
    /// # Errors
    /// Returns an error when the token cannot be minted.
    fn issue(&self, user_id: i32, kind: TokenKind) -> ServiceResult<String>;

    /// Resolve a token back to its user id.
    ///
    /// # Errors
    /// Returns [`ServiceError::Authentication`] for invalid or expired tokens.
    fn verify(&self, token: &str) -> ServiceResult<i32>;
}

/// Public view of a user row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    /// Row id.
    pub id: i32,
    /// Unique login name.
    pub username: String,
    /// Account role.
    pub role: Role,
    /// Deactivated accounts cannot sign in.
    pub is_active: bool,
    /// Free-form profile attributes.
    pub profile_data: Value,
    /// Registration time (UTC).
    pub created_at: NaiveDateTime,
    /// Last modification time (UTC).
    pub updated_at: NaiveDateTime,
    /// Email address; only shown to the account owner and admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserView {
    /// Render a row, optionally including the email address.
    ///
    /// # Errors
    /// Returns [`ServiceError::Validation`] when the stored role is unknown.
    pub fn new(user: User, include_email: bool) -> ServiceResult<Self> {
        let role = user.role()?;
        Ok(Self {
            id: user.id,
            username: user.username,
            role,
            is_active: user.is_active,
            profile_data: Value::Object(profile_map(&user.profile_data)),
            created_at: user.created_at,
            updated_at: user.updated_at,
            email: include_email.then_some(user.email),
        })
    }
}

/// A user together with freshly issued tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedIn {
    /// The signed-in account.
    pub user: UserView,
    /// Short-lived bearer token.
    pub access_token: String,
    /// Long-lived token for renewing the access token.
    pub refresh_token: String,
}

/// Self-service registration input.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Requested login name.
    pub username: String,
    /// Contact address; must be unique.
    pub email: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// Requested role; elevated roles are only honoured before the first
    /// admin exists.
    pub role: Option<String>,
    /// Initial profile attributes.
    pub profile_data: Option<Map<String, Value>>,
}

/// Admin-created account input. The role is mandatory.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    /// Login name.
    pub username: String,
    /// Contact address; must be unique.
    pub email: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// One of `admin`, `tech_writer` or `user`.
    pub role: String,
    /// Initial profile attributes.
    pub profile_data: Option<Map<String, Value>>,
}

/// Profile edits; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New login name.
    pub username: Option<String>,
    /// New contact address.
    pub email: Option<String>,
    /// New password; must not be empty.
    pub password: Option<String>,
    /// Keys merged into the stored profile attributes.
    pub profile_data: Option<Map<String, Value>>,
}

fn profile_map(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn now() -> NaiveDateTime { Utc::now().naive_utc() }

fn hash(argon2: &Argon2, password: &str) -> ServiceResult<String> {
    hash_password(argon2, password).map_err(|e| ServiceError::Hashing(e.to_string()))
}

fn check_identity_fields(username: &str, email: &str, password: &str) -> ServiceResult<()> {
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ServiceError::validation("Missing required fields"));
    }
    validate_username(username).map_err(ServiceError::validation)?;
    if !is_valid_email(email) {
        return Err(ServiceError::validation("Invalid email format"));
    }
    Ok(())
}

async fn ensure_unique(
    conn: &mut DbConnection,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i32>,
) -> ServiceResult<()> {
    if let Some(name) = username {
        let found = users::get_user_by_name(conn, name).await?;
        if found.is_some_and(|u| Some(u.id) != except) {
            return Err(ServiceError::conflict("Username already exists"));
        }
    }
    if let Some(addr) = email {
        let taken = users::get_user_by_email(conn, addr).await?;
        if taken.is_some_and(|u| Some(u.id) != except) {
            return Err(ServiceError::conflict("Email already exists"));
        }
    }
    Ok(())
}

async fn insert_account(
    conn: &mut DbConnection,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    profile: &Map<String, Value>,
    bootstrap: bool,
) -> ServiceResult<User> {
    let profile_json = Value::Object(profile.clone()).to_string();
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            ensure_unique(conn, Some(username), Some(email), None).await?;
            let granted = if bootstrap && role != Role::User && users::admin_exists(conn).await? {
                Role::User
            } else {
                role
            };
            let ts = now();
            let user = users::create_user(
                conn,
                &NewUser {
                    username,
                    email,
                    password_hash,
                    role: granted.as_str(),
                    is_active: true,
                    profile_data: &profile_json,
                    created_at: ts,
                    updated_at: ts,
                },
            )
            .await?;
            Ok(user)
        })
    })
    .await
}

fn sign_in(tokens: &dyn IdentityTokens, user: User) -> ServiceResult<SignedIn> {
    let access_token = tokens.issue(user.id, TokenKind::Access)?;
    let refresh_token = tokens.issue(user.id, TokenKind::Refresh)?;
    Ok(SignedIn {
        user: UserView::new(user, true)?,
        access_token,
        refresh_token,
    })
}

/// Register a new account and sign it in.
///
/// # Errors
/// Returns `Validation` for missing or malformed fields, `Conflict` when the
/// username or email is taken, or a store error.
pub async fn register(
    conn: &mut DbConnection,
    argon2: &Argon2<'_>,
    tokens: &dyn IdentityTokens,
    input: Registration,
) -> ServiceResult<SignedIn> {
    check_identity_fields(&input.username, &input.email, &input.password)?;
    let role = match input.role.as_deref() {
        None => Role::User,
        Some(r) => r
            .parse::<Role>()
            .map_err(|_| ServiceError::validation("Invalid role"))?,
    };
    let password_hash = hash(argon2, &input.password)?;
    let profile = input.profile_data.unwrap_or_default();
    let user = insert_account(
        conn,
        &input.username,
        &input.email,
        &password_hash,
        role,
        &profile,
        true,
    )
    .await?;
    info!(user_id = user.id, role = %user.role, "user registered");
    sign_in(tokens, user)
}

/// Check credentials and issue tokens.
///
/// # Errors
/// Returns `Authentication` for unknown emails or wrong passwords and
/// `Forbidden` for deactivated accounts.
pub async fn login(
    conn: &mut DbConnection,
    argon2: &Argon2<'_>,
    tokens: &dyn IdentityTokens,
    email: &str,
    password: &str,
) -> ServiceResult<SignedIn> {
    if email.is_empty() || password.is_empty() {
        return Err(ServiceError::validation("Email and password are required"));
    }
    let Some(user) = users::get_user_by_email(conn, email).await? else {
        return Err(ServiceError::Authentication("Invalid credentials".to_owned()));
    };
    if !verify_password(argon2, &user.password_hash, password) {
        return Err(ServiceError::Authentication("Invalid credentials".to_owned()));
    }
    if !user.is_active {
        return Err(ServiceError::forbidden("Account is deactivated"));
    }
    info!(user_id = user.id, "user logged in");
    sign_in(tokens, user)
}

/// Exchange a refresh token for a new access token.
///
/// # Errors
/// Returns `Authentication` for bad tokens and the errors of [`resolve_actor`].
pub async fn refresh(
    conn: &mut DbConnection,
    tokens: &dyn IdentityTokens,
    refresh_token: &str,
) -> ServiceResult<String> {
    let actor = authenticate(conn, tokens, refresh_token).await?;
    tokens.issue(actor.user_id, TokenKind::Access)
}

/// Load the acting user and check it may act.
///
/// # Errors
/// Returns `NotFound` for unknown ids and `Forbidden` for deactivated accounts.
pub async fn resolve_actor(conn: &mut DbConnection, user_id: i32) -> ServiceResult<Actor> {
    let Some(user) = users::get_user(conn, user_id).await? else {
        return Err(ServiceError::not_found("User not found"));
    };
    if !user.is_active {
        return Err(ServiceError::forbidden("Account is deactivated"));
    }
    Ok(Actor::new(user.id, user.role()?))
}

/// Verify a token and resolve the acting user.
///
/// # Errors
/// Returns `Authentication` for bad tokens and the errors of [`resolve_actor`].
pub async fn authenticate(
    conn: &mut DbConnection,
    tokens: &dyn IdentityTokens,
    token: &str,
) -> ServiceResult<Actor> {
    let user_id = tokens.verify(token)?;
    resolve_actor(conn, user_id).await
}

/// The acting user's own profile, email included.
///
/// # Errors
/// Returns `NotFound` when the account vanished.
pub async fn profile(conn: &mut DbConnection, actor: &Actor) -> ServiceResult<UserView> {
    let user = users::get_user(conn, actor.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    UserView::new(user, true)
}

/// Edit the acting user's profile.
///
/// # Errors
/// Returns `Validation` for malformed fields, `Conflict` when the new
/// username or email belongs to someone else, or a store error.
pub async fn update_profile(
    conn: &mut DbConnection,
    argon2: &Argon2<'_>,
    actor: &Actor,
    update: ProfileUpdate,
) -> ServiceResult<UserView> {
    if let Some(name) = update.username.as_deref() {
        validate_username(name).map_err(ServiceError::validation)?;
    }
    if update.email.as_deref().is_some_and(|e| !is_valid_email(e)) {
        return Err(ServiceError::validation("Invalid email format"));
    }
    let password_hash = match update.password.as_deref() {
        Some("") => return Err(ServiceError::validation("Password cannot be empty")),
        Some(pw) => Some(hash(argon2, pw)?),
        None => None,
    };
    let user_id = actor.user_id;
    let user = conn
        .transaction::<_, ServiceError, _>(|conn| {
            Box::pin(async move {
                let current = users::get_user(conn, user_id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("User not found"))?;
                ensure_unique(
                    conn,
                    update.username.as_deref(),
                    update.email.as_deref(),
                    Some(user_id),
                )
                .await?;
                let profile_data = update.profile_data.map(|patch| {
                    let mut merged = profile_map(&current.profile_data);
                    merged.extend(patch);
                    Value::Object(merged).to_string()
                });
                let changes = UserChanges {
                    username: update.username,
                    email: update.email,
                    password_hash,
                    is_active: None,
                    profile_data,
                    updated_at: Some(now()),
                };
                Ok(users::update_user(conn, user_id, &changes).await?)
            })
        })
        .await?;
    UserView::new(user, true)
}

/// Admin: create an account with an explicit role.
///
/// # Errors
/// Returns `Forbidden` for non-admins, `Validation` for malformed fields or an
/// unknown role, `Conflict` for taken usernames or emails.
pub async fn add_user(
    conn: &mut DbConnection,
    argon2: &Argon2<'_>,
    actor: &Actor,
    input: NewAccount,
) -> ServiceResult<UserView> {
    authorize(actor, Permissions::MANAGE_USERS)?;
    check_identity_fields(&input.username, &input.email, &input.password)?;
    let role = input
        .role
        .parse::<Role>()
        .map_err(|_| ServiceError::validation("Invalid role"))?;
    let password_hash = hash(argon2, &input.password)?;
    let profile = input.profile_data.unwrap_or_default();
    let user = insert_account(
        conn,
        &input.username,
        &input.email,
        &password_hash,
        role,
        &profile,
        false,
    )
    .await?;
    info!(user_id = user.id, role = %user.role, by = actor.user_id, "user created");
    UserView::new(user, true)
}

/// Operator: create an account with an explicit role outside any request,
/// as the `create-user` command does.
///
/// # Errors
/// Returns `Validation` for malformed fields or an unknown role and
/// `Conflict` for taken usernames or emails.
pub async fn provision_account(
    conn: &mut DbConnection,
    argon2: &Argon2<'_>,
    input: NewAccount,
) -> ServiceResult<UserView> {
    check_identity_fields(&input.username, &input.email, &input.password)?;
    let role = input
        .role
        .parse::<Role>()
        .map_err(|_| ServiceError::validation("Invalid role"))?;
    let password_hash = hash(argon2, &input.password)?;
    let profile = input.profile_data.unwrap_or_default();
    let user = insert_account(
        conn,
        &input.username,
        &input.email,
        &password_hash,
        role,
        &profile,
        false,
    )
    .await?;
    info!(user_id = user.id, role = %user.role, "user provisioned");
    UserView::new(user, true)
}

/// Resolve an active account by username, for operator commands.
///
/// # Errors
/// Returns `NotFound` for unknown names and `Forbidden` for deactivated
/// accounts.
pub async fn actor_by_name(conn: &mut DbConnection, username: &str) -> ServiceResult<Actor> {
    let Some(user) = users::get_user_by_name(conn, username).await? else {
        return Err(ServiceError::not_found("User not found"));
    };
    resolve_actor(conn, user.id).await
}

/// Admin: list accounts filtered by role and active flag.
///
/// # Errors
/// Returns `Forbidden` for non-admins and `Validation` for an unknown role.
pub async fn list_users(
    conn: &mut DbConnection,
    actor: &Actor,
    role: Option<&str>,
    active: Option<bool>,
    page: PageRequest,
) -> ServiceResult<Page<UserView>> {
    authorize(actor, Permissions::MANAGE_USERS)?;
    let wanted = role.map(str::parse::<Role>).transpose()?;
    let (rows, total) = users::list_users(conn, wanted.map(Role::as_str), active, page).await?;
    let items = rows
        .into_iter()
        .map(|u| UserView::new(u, true))
        .collect::<ServiceResult<Vec<_>>>()?;
    Ok(page.wrap(items, total))
}

async fn set_active(
    conn: &mut DbConnection,
    user_id: i32,
    active: bool,
) -> ServiceResult<User> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        Box::pin(async move {
            if users::get_user(conn, user_id).await?.is_none() {
                return Err(ServiceError::not_found("User not found"));
            }
            let changes = UserChanges {
                is_active: Some(active),
                updated_at: Some(now()),
                ..UserChanges::default()
            };
            Ok(users::update_user(conn, user_id, &changes).await?)
        })
    })
    .await
}

/// Admin: deactivate an account and build the notice for its owner.
///
/// # Errors
/// Returns `Forbidden` for non-admins, `Validation` when targeting oneself and
/// `NotFound` for unknown ids.
pub async fn deactivate_user(
    conn: &mut DbConnection,
    actor: &Actor,
    user_id: i32,
    reason: Option<&str>,
) -> ServiceResult<Notified<UserView>> {
    authorize(actor, Permissions::MANAGE_USERS)?;
    if user_id == actor.user_id {
        return Err(ServiceError::validation("Cannot deactivate your own account"));
    }
    let user = set_active(conn, user_id, false).await?;
    info!(user_id, by = actor.user_id, "user deactivated");
    let notice = notifications::account_deactivated(user_id, reason, now());
    Ok(Notified {
        value: UserView::new(user, true)?,
        notifications: vec![notice],
    })
}

/// Admin: reactivate an account.
///
/// # Errors
/// Returns `Forbidden` for non-admins and `NotFound` for unknown ids.
pub async fn activate_user(
    conn: &mut DbConnection,
    actor: &Actor,
    user_id: i32,
) -> ServiceResult<UserView> {
    authorize(actor, Permissions::MANAGE_USERS)?;
    let user = set_active(conn, user_id, true).await?;
    info!(user_id, by = actor.user_id, "user activated");
    UserView::new(user, true)
}
