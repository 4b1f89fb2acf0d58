//! Administrative command handlers.
//!
//! Each command opens one connection, applies migrations, runs a single
//! component operation and prints its result as JSON.

#![allow(
    clippy::print_stdout,
    reason = "intentional user output for CLI commands"
)]

use anyhow::{Context, Result, anyhow};
use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use ortho_config::load_and_merge_subcommand_for;
use serde::Serialize;
use tracing::info;

use super::{AppConfig, Commands, CreateUserArgs};
use crate::{
    accounts::{self, NewAccount},
    categories::{self, CategoryInput},
    content,
    db::{DbConnection, open_migrated},
    notifications::{NotificationTransport, TracingTransport},
};

/// Build an Argon2 instance using the supplied configuration parameters.
///
/// # Errors
///
/// Returns any error emitted while constructing the Argon2 parameter set.
pub fn argon2_from_config(cfg: &AppConfig) -> Result<Argon2<'static>> {
    let params = ParamsBuilder::new()
        .m_cost(cfg.argon2_m_cost)
        .t_cost(cfg.argon2_t_cost)
        .p_cost(cfg.argon2_p_cost)
        .build()
        .with_context(|| {
            format!(
                "invalid Argon2 params derived from config: m_cost={}, t_cost={}, p_cost={}",
                cfg.argon2_m_cost, cfg.argon2_t_cost, cfg.argon2_p_cost
            )
        })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

async fn connect(cfg: &AppConfig) -> Result<DbConnection> {
    open_migrated(&cfg.database)
        .await
        .with_context(|| format!("failed to prepare database '{}'", cfg.database))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute an administrative command.
///
/// # Errors
///
/// Propagates failures from configuration merging, database access or the
/// operation itself.
pub async fn run_command(command: Commands, cfg: &AppConfig) -> Result<()> {
    let settings = cfg.settings()?;
    match command {
        Commands::Migrate => {
            connect(cfg).await?;
            info!(database = %cfg.database, "migrations applied");
            println!("Migrations applied to {}", cfg.database);
            Ok(())
        }
        Commands::CreateUser(args) => {
            let merged = load_and_merge_subcommand_for::<CreateUserArgs>(&args)?;
            run_create_user(merged, cfg).await
        }
        Commands::CreateCategory(args) => {
            let mut conn = connect(cfg).await?;
            let actor = accounts::actor_by_name(&mut conn, &args.acting).await?;
            let input = CategoryInput {
                name: args.name,
                description: args.description,
                slug: args.slug,
            };
            let cat = categories::create_category(&mut conn, &actor, input).await?;
            print_json(&cat)
        }
        Commands::Pending(args) => {
            let mut conn = connect(cfg).await?;
            let actor = accounts::actor_by_name(&mut conn, &args.acting).await?;
            let page = settings.page(args.page, args.per_page);
            let queue = content::list_pending(&mut conn, &actor, page).await?;
            print_json(&queue)
        }
        Commands::Approve(args) => {
            let mut conn = connect(cfg).await?;
            let actor = accounts::actor_by_name(&mut conn, &args.acting).await?;
            let outcome = content::approve_content(&mut conn, &actor, args.content_id).await?;
            TracingTransport.deliver(&outcome.notifications).await?;
            print_json(&outcome)
        }
        Commands::Flag(args) => {
            let mut conn = connect(cfg).await?;
            let actor = accounts::actor_by_name(&mut conn, &args.acting).await?;
            let outcome =
                content::flag_content(&mut conn, &actor, args.content_id, &args.reason).await?;
            TracingTransport.deliver(&outcome.notifications).await?;
            print_json(&outcome)
        }
    }
}

async fn run_create_user(args: CreateUserArgs, cfg: &AppConfig) -> Result<()> {
    let username = args.username.ok_or_else(|| anyhow!("missing username"))?;
    let email = args.email.ok_or_else(|| anyhow!("missing email"))?;
    let password = args.password.ok_or_else(|| anyhow!("missing password"))?;
    let role = args.role.unwrap_or_else(|| "user".to_owned());

    let argon2 = argon2_from_config(cfg)?;
    let mut conn = connect(cfg).await?;
    let input = NewAccount {
        username,
        email,
        password,
        role,
        profile_data: None,
    };
    let user = accounts::provision_account(&mut conn, &argon2, input)
        .await
        .context("failed to create user")?;
    print_json(&user)
}
