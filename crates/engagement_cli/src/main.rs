//! `engagement` command-line boundary.
//!
//! # Responsibility
//! - Supply caller identities from arguments and invoke the engines.
//! - Print results as JSON on stdout and classified errors on stderr.
//!
//! # Invariants
//! - Every error exits with the code of its `ErrorKind`.
//! - The runtime is shut down before exit so queued events drain.

use clap::{Args, Parser, Subcommand};
use engagement_core::db::migrations::latest_version;
use engagement_core::{
    bootstrap, error_chain, init_logging, EngagementConfig, EngagementError, EngagementRuntime,
    ErrorKind, LogTarget, LoggingPublisher,
};
use log::info;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

/// Follow/unfollow and like/unlike against the engagement store.
#[derive(Parser, Debug)]
#[command(name = "engagement", version, about, long_about = None)]
struct Cli {
    /// TOML config file; defaults plus ENGAGEMENT_* overrides when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the database and apply pending migrations.
    Migrate,
    /// Follow a user.
    Follow(Pair),
    /// Unfollow a user.
    Unfollow(Pair),
    /// Check whether a live follow edge exists.
    IsFollowing(Pair),
    /// List users following `--user`.
    Followers(UserPage),
    /// List users `--user` follows.
    Following(UserPage),
    /// Follower and following totals of `--user`.
    Counts {
        #[arg(long)]
        user: Uuid,
    },
    /// Like a target.
    Like {
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        target: Uuid,
    },
    /// Remove a like owned by `--actor`.
    Unlike {
        #[arg(long)]
        reaction: Uuid,
        #[arg(long)]
        actor: Uuid,
    },
    /// List live likes by an actor.
    ReactionsByActor {
        #[arg(long)]
        actor: Uuid,
        #[command(flatten)]
        page: Page,
    },
    /// List live likes on a target.
    ReactionsByTarget {
        #[arg(long)]
        target: Uuid,
        #[command(flatten)]
        page: Page,
    },
}

#[derive(Args, Debug)]
struct Pair {
    #[arg(long)]
    follower: Uuid,
    #[arg(long)]
    followee: Uuid,
}

#[derive(Args, Debug)]
struct Page {
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    limit: i64,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    offset: i64,
}

#[derive(Args, Debug)]
struct UserPage {
    #[arg(long)]
    user: Uuid,
    #[command(flatten)]
    page: Page,
}

enum CliError {
    Engagement(EngagementError),
    Internal(String),
}

impl From<EngagementError> for CliError {
    fn from(value: EngagementError) -> Self {
        Self::Engagement(value)
    }
}

impl CliError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Engagement(err) => err.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Engagement(err) => error_chain(err),
            Self::Internal(message) => message.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let kind = err.kind();
            eprintln!(
                "error kind={} message={}",
                kind,
                err.message().replace(['\n', '\r'], " ")
            );
            ExitCode::from(exit_code(kind))
        }
    }
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let config = match &cli.config {
        Some(path) => EngagementConfig::load(path),
        None => EngagementConfig::from_env(),
    }
    .map_err(|err| CliError::Internal(err.to_string()))?;

    init_logging(
        &config.logging.level,
        LogTarget::from_dir(config.logging.dir.as_deref()),
    )
    .map_err(CliError::Internal)?;

    let publisher = Arc::new(LoggingPublisher::new(config.events.exchange.clone()));
    let runtime = bootstrap(&config, publisher).map_err(|err| CliError::Internal(err.to_string()))?;

    let result = execute(&runtime, &config, cli.command);
    let report = runtime.shutdown();
    info!(
        "event=cli_exit module=cli status=ok drained={} published={} failed={} dropped={}",
        report.drained, report.stats.published, report.stats.failed, report.stats.dropped
    );
    result
}

fn execute(
    runtime: &EngagementRuntime,
    config: &EngagementConfig,
    command: Command,
) -> Result<Value, CliError> {
    let value = match command {
        Command::Migrate => json!({
            "database": config.database.path,
            "schema_version": latest_version(),
        }),
        Command::Follow(pair) => {
            let edge = runtime.subscriptions().follow(pair.follower, pair.followee)?;
            to_json(&edge)?
        }
        Command::Unfollow(pair) => {
            let deleted_at = runtime
                .subscriptions()
                .unfollow(pair.follower, pair.followee)?;
            json!({
                "follower_id": pair.follower,
                "followee_id": pair.followee,
                "deleted_at": deleted_at,
            })
        }
        Command::IsFollowing(pair) => {
            let following = runtime
                .queries()
                .is_following(pair.follower, pair.followee)?;
            json!({ "following": following })
        }
        Command::Followers(query) => to_json(&runtime.queries().followers(
            query.user,
            query.page.limit,
            query.page.offset,
        )?)?,
        Command::Following(query) => to_json(&runtime.queries().following(
            query.user,
            query.page.limit,
            query.page.offset,
        )?)?,
        Command::Counts { user } => to_json(&runtime.queries().follow_counts(user)?)?,
        Command::Like { actor, target } => to_json(&runtime.reactions().like(actor, target)?)?,
        Command::Unlike { reaction, actor } => {
            let deleted_at = runtime.reactions().unlike(reaction, actor)?;
            json!({ "id": reaction, "deleted_at": deleted_at })
        }
        Command::ReactionsByActor { actor, page } => to_json(
            &runtime
                .queries()
                .reactions_by_actor(actor, page.limit, page.offset)?,
        )?,
        Command::ReactionsByTarget { target, page } => {
            let reactions = runtime
                .queries()
                .reactions_by_target(target, page.limit, page.offset)?;
            let total = runtime.queries().reaction_count(target)?;
            let items = to_json(&reactions)?;
            json!({ "total": total, "items": items })
        }
    };
    Ok(value)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value)
        .map_err(|err| CliError::Internal(format!("failed to encode output: {err}")))
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidArgument => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Conflict => 4,
        ErrorKind::Timeout => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::{exit_code, Cli, CliError, Command};
    use clap::{CommandFactory, Parser};
    use engagement_core::{EngagementError, ErrorKind};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        assert_eq!(exit_code(ErrorKind::Internal), 1);
        assert_eq!(exit_code(ErrorKind::InvalidArgument), 2);
        assert_eq!(exit_code(ErrorKind::NotFound), 3);
        assert_eq!(exit_code(ErrorKind::Conflict), 4);
        assert_eq!(exit_code(ErrorKind::Timeout), 5);
    }

    #[test]
    fn negative_offset_reaches_the_engine() {
        let cli = Cli::parse_from([
            "engagement",
            "followers",
            "--user",
            "6f1c1a4e-8d2b-4f7e-9a7b-0c1d2e3f4a5b",
            "--offset",
            "-1",
        ]);
        match cli.command {
            Command::Followers(query) => {
                assert_eq!(query.page.offset, -1);
                assert_eq!(query.page.limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn engagement_error_message_includes_cause() {
        let err = CliError::from(EngagementError::InvalidArgument(
            "follower_id must not be nil".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.message().contains("follower_id must not be nil"));
    }
}
