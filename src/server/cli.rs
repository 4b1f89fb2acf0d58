//! Command-line interface definitions for the `pressroom` binary.
//!
//! Configuration merges CLI flags, `PRESSROOM_*` environment variables and a
//! `.pressroom.toml` dotfile through `ortho_config`.

#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![allow(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]
#![allow(
    unfulfilled_lint_expectations,
    reason = "derive macros conditionally generate items"
)]

use argon2::Params;
use clap::{Args, Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::handler::{Environment, Settings};

/// Arguments for the `create-user` administrative subcommand.
#[expect(
    missing_docs,
    reason = "OrthoConfig derive macro generates items that cannot be documented"
)]
#[derive(Parser, OrthoConfig, Deserialize, Serialize, Default, Debug, Clone)]
#[ortho_config(prefix = "PRESSROOM_")]
pub struct CreateUserArgs {
    /// Username for the new account.
    #[arg(long)]
    pub username: Option<String>,
    /// Email address for the new account.
    #[arg(long)]
    pub email: Option<String>,
    /// Password for the new account.
    #[arg(long)]
    pub password: Option<String>,
    /// Role: `admin`, `tech_writer` or `user`.
    #[arg(long)]
    pub role: Option<String>,
}

/// Arguments for `create-category`.
#[derive(Args, Deserialize, Serialize, Debug, Clone)]
pub struct CreateCategoryArgs {
    /// Username of the acting tech writer or admin.
    #[arg(long = "as")]
    pub acting: String,
    /// Category name.
    #[arg(long)]
    pub name: String,
    /// Optional description.
    #[arg(long)]
    pub description: Option<String>,
    /// Explicit slug; derived from the name when omitted.
    #[arg(long)]
    pub slug: Option<String>,
}

/// Arguments for `pending`.
#[derive(Args, Deserialize, Serialize, Debug, Clone)]
pub struct PendingArgs {
    /// Username of the acting admin.
    #[arg(long = "as")]
    pub acting: String,
    /// One-based page number.
    #[arg(long)]
    pub page: Option<i64>,
    /// Rows per page.
    #[arg(long)]
    pub per_page: Option<i64>,
}

/// Arguments for `approve`.
#[derive(Args, Deserialize, Serialize, Debug, Clone)]
pub struct ApproveArgs {
    /// Username of the acting moderator.
    #[arg(long = "as")]
    pub acting: String,
    /// Content to approve.
    pub content_id: i32,
}

/// Arguments for `flag`.
#[derive(Args, Deserialize, Serialize, Debug, Clone)]
pub struct FlagArgs {
    /// Username of the acting moderator.
    #[arg(long = "as")]
    pub acting: String,
    /// Content to flag.
    pub content_id: i32,
    /// Reason shown to the author.
    #[arg(long)]
    pub reason: String,
}

/// CLI subcommands exposed by `pressroom`.
#[derive(Subcommand, Deserialize, Serialize, Debug, Clone)]
pub enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Create a user account with an explicit role.
    #[command(name = "create-user")]
    CreateUser(CreateUserArgs),
    /// Create a category.
    #[command(name = "create-category")]
    CreateCategory(CreateCategoryArgs),
    /// List the moderation queue.
    Pending(PendingArgs),
    /// Approve content.
    Approve(ApproveArgs),
    /// Flag content with a reason.
    Flag(FlagArgs),
}

/// Runtime configuration.
#[expect(
    missing_docs,
    reason = "OrthoConfig derive macro generates items that cannot be documented"
)]
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "PRESSROOM_")]
pub struct AppConfig {
    /// Database connection string or path.
    #[ortho_config(default = "pressroom.db".to_owned())]
    #[arg(long, default_value_t = String::from("pressroom.db"))]
    pub database: String,
    /// `development` exposes internal error details; `production` hides them.
    #[ortho_config(default = "development".to_owned())]
    #[arg(long, default_value_t = String::from("development"))]
    pub environment: String,
    /// Argon2 memory cost parameter.
    #[ortho_config(default = Params::DEFAULT_M_COST)]
    #[arg(long, default_value_t = Params::DEFAULT_M_COST)]
    pub argon2_m_cost: u32,
    /// Argon2 time cost parameter.
    #[ortho_config(default = Params::DEFAULT_T_COST)]
    #[arg(long, default_value_t = Params::DEFAULT_T_COST)]
    pub argon2_t_cost: u32,
    /// Argon2 parallelism cost parameter.
    #[ortho_config(default = Params::DEFAULT_P_COST)]
    #[arg(long, default_value_t = Params::DEFAULT_P_COST)]
    pub argon2_p_cost: u32,
    /// Deepest reply level nested in comment listings.
    #[ortho_config(default = 3)]
    #[arg(long, default_value_t = 3)]
    pub comment_depth: usize,
    /// Default page size.
    #[ortho_config(default = 20)]
    #[arg(long, default_value_t = 20)]
    pub per_page: i64,
    /// Page size ceiling.
    #[ortho_config(default = 100)]
    #[arg(long, default_value_t = 100)]
    pub max_per_page: i64,
}

impl AppConfig {
    /// Runtime settings derived from this configuration.
    ///
    /// # Errors
    /// Returns an error when `environment` is not a known mode.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let environment: Environment = self.environment.parse()?;
        Ok(Settings {
            environment,
            comment_depth: self.comment_depth,
            per_page: self.per_page,
            max_per_page: self.max_per_page,
        })
    }
}

/// Top-level CLI entry point.
#[derive(Parser, Deserialize, Serialize, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Application configuration.
    #[command(flatten)]
    pub config: AppConfig,
    /// Administrative command to run.
    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn env_config_loading() {
        Jail::expect_with(|j| {
            j.set_env("PRESSROOM_DATABASE", "env.db");
            j.set_env("PRESSROOM_COMMENT_DEPTH", "5");
            let cfg = AppConfig::load_from_iter(["pressroom"]).expect("load");
            assert_eq!(cfg.database, "env.db");
            assert_eq!(cfg.comment_depth, 5);
            assert_eq!(cfg.per_page, 20);
            Ok(())
        });
    }

    #[rstest]
    fn cli_overrides_env() {
        Jail::expect_with(|j| {
            j.set_env("PRESSROOM_ENVIRONMENT", "development");
            let cfg = AppConfig::load_from_iter(["pressroom", "--environment", "production"])
                .expect("load");
            assert_eq!(cfg.environment, "production");
            let settings = cfg.settings().expect("settings");
            assert_eq!(settings.environment, Environment::Production);
            Ok(())
        });
    }

    #[rstest]
    fn loads_from_dotfile() {
        Jail::expect_with(|j| {
            j.create_file(".pressroom.toml", "max_per_page = 50\ndatabase = \"file.db\"")?;
            let cfg = AppConfig::load_from_iter(["pressroom"]).expect("load");
            assert_eq!(cfg.max_per_page, 50);
            assert_eq!(cfg.database, "file.db");
            Ok(())
        });
    }

    #[rstest]
    fn argon2_cli() {
        Jail::expect_with(|_j| {
            let cfg =
                AppConfig::load_from_iter(["pressroom", "--argon2-m-cost", "1024"]).expect("load");
            assert_eq!(cfg.argon2_m_cost, 1024);
            Ok(())
        });
    }

    #[rstest]
    fn unknown_environment_is_rejected() {
        let cfg = AppConfig {
            environment: "staging".to_owned(),
            ..AppConfig::default()
        };
        assert!(cfg.settings().is_err());
    }

    #[rstest]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["pressroom", "flag", "7", "--as", "root", "--reason", "spam"])
            .expect("parse");
        match cli.command {
            Commands::Flag(args) => {
                assert_eq!(args.content_id, 7);
                assert_eq!(args.acting, "root");
                assert_eq!(args.reason, "spam");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
