//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `kiu_core` linkage (`kiu_cli` with no subcommand).
//! - Print one user's visible category tree, a single access decision, or
//!   the user's notification inbox against a real database file.
//!
//! The database comes from the trailing `DB` argument, or from `db_path` in
//! the `--config` file when the argument is omitted.

use clap::{Parser, Subcommand};
use kiu_core::{
    init_logging_from_config, now_epoch_ms, AccessResolver, CatalogService, CategoryId,
    CategoryNode, CoreConfig, NotificationReadTracker, SqliteAccessStore,
    SqliteCategoryRepository, UserId,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Smoke tool for the KIU access core.
#[derive(Parser, Debug)]
#[command(name = "kiu_cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the categories a user can see
    Tree {
        user_id: UserId,
        /// SQLite file; overrides `db_path` from the config
        db: Option<PathBuf>,
    },
    /// Print `allow` or `deny` for one category
    Check {
        user_id: UserId,
        category_id: CategoryId,
        /// SQLite file; overrides `db_path` from the config
        db: Option<PathBuf>,
    },
    /// Print the notifications a user can see, newest first
    Inbox {
        user_id: UserId,
        /// SQLite file; overrides `db_path` from the config
        db: Option<PathBuf>,
        /// Page size; defaults to `notification_limit` from the config
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl Command {
    fn db(&self) -> Option<&PathBuf> {
        match self {
            Self::Tree { db, .. } | Self::Check { db, .. } | Self::Inbox { db, .. } => db.as_ref(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("kiu_core ping={}", kiu_core::ping());
        println!("kiu_core version={}", kiu_core::core_version());
        return ExitCode::SUCCESS;
    };

    match run(cli.config, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<PathBuf>, command: Command) -> Result<(), Box<dyn Error>> {
    let mut config = match config_path {
        Some(path) => CoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = command.db() {
        config.db_path = Some(db.clone());
    }
    if config.db_path.is_none() {
        return Err("no database: pass DB or set `db_path` in the config".into());
    }
    init_logging_from_config(&config)?;
    let conn = config.open_database()?;

    match command {
        Command::Tree { user_id, .. } => {
            let catalog = CatalogService::try_new(&conn, config.denial_policy)?;
            let forest = catalog.tree(user_id)?;
            for node in &forest {
                print_node(node, 0);
            }
            info!(
                "event=cli_tree module=cli status=ok roots={}",
                forest.len()
            );
        }
        Command::Check {
            user_id,
            category_id,
            ..
        } => {
            let tree = SqliteCategoryRepository::try_new(&conn)?;
            let store = SqliteAccessStore::try_new(&conn)?;
            let allowed = AccessResolver::new(&tree, &store).can_access(user_id, category_id)?;
            println!("{}", if allowed { "allow" } else { "deny" });
        }
        Command::Inbox { user_id, limit, .. } => {
            let tracker = NotificationReadTracker::from_config(&conn, &config)?;
            for item in tracker.list_for_user(user_id, now_epoch_ms(), limit)? {
                println!(
                    "{} [{}] {}",
                    item.notification.id,
                    if item.is_read { "read" } else { "new" },
                    item.notification.title
                );
            }
        }
    }
    Ok(())
}

fn print_node(node: &CategoryNode, indent: usize) {
    println!(
        "{:indent$}{} [{}] {}",
        "",
        node.category.id,
        node.category.level.depth(),
        node.category.title,
        indent = indent * 2
    );
    for child in &node.children {
        print_node(child, indent + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["kiu_cli", "tree", "7", "kiu.db", "--config", "c.json"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert!(matches!(
            cli.command,
            Some(Command::Tree { user_id: 7, db: Some(ref db) }) if db == &PathBuf::from("kiu.db")
        ));
    }

    #[test]
    fn database_argument_is_optional() {
        let cli = Cli::try_parse_from(["kiu_cli", "-c", "c.json", "check", "7", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Check {
                user_id: 7,
                category_id: 3,
                db: None
            })
        ));
    }

    #[test]
    fn no_subcommand_is_the_smoke_check() {
        assert!(Cli::try_parse_from(["kiu_cli"]).unwrap().command.is_none());
        assert!(Cli::try_parse_from(["kiu_cli", "check", "seven", "3"]).is_err());
    }
}
