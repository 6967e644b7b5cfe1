//! `stuffctl`: inspect and modify a stuff database from the shell.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use stuff_core::{Customer, Location, VersionedThingy};
use stuff_store::config::DEFAULT_DB_FILE;
use stuff_store::logging::{init_tracing, LogFormat};
use stuff_store::{Database, DatabaseConfig, StuffStore};

#[derive(Debug, Parser)]
#[command(name = "stuffctl", version, about = "Stuff database command-line tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Database file.
    #[arg(long, env = "STUFF_DB_PATH", default_value = DEFAULT_DB_FILE, global = true)]
    db: PathBuf,

    /// Use a throwaway in-memory database.
    #[arg(long, env = "STUFF_IN_MEMORY", global = true)]
    in_memory: bool,

    /// Log line format.
    #[arg(long, env = "STUFF_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert a customer
    AddCustomer {
        #[arg(long)]
        postal_code: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
        /// Repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Explicit id; a random one is generated otherwise.
        #[arg(long)]
        id: Option<String>,
    },
    /// Find customers by postal code
    Find {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print only id and display name.
        #[arg(long)]
        display: bool,
        #[arg(required = true)]
        postal_codes: Vec<String>,
    },
    /// Print customer count and greatest postal code
    Stats,
    /// Delete customers by id
    Nuke {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Insert a versioned thingy
    AddThingy {
        /// Explicit id; a random one is generated otherwise.
        #[arg(long)]
        id: Option<String>,
        #[arg(long = "version-code", default_value_t = 1, allow_negative_numbers = true)]
        version_code: i32,
    },
    /// Show one version, or every version, of a thingy
    Thingy {
        id: String,
        #[arg(long = "version-code", allow_negative_numbers = true)]
        version_code: Option<i32>,
    },
}

impl Cli {
    fn database_config(&self) -> DatabaseConfig {
        if self.in_memory {
            DatabaseConfig::ephemeral()
        } else {
            DatabaseConfig::durable(&self.db)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let db = Database::open(cli.database_config()).await?;
    let outcome = run(&db.store(), cli.command).await;
    db.close().await?;

    println!("{}", outcome?);
    Ok(())
}

/// Executes one subcommand and renders its result as JSON.
async fn run(store: &StuffStore, command: Command) -> anyhow::Result<String> {
    match command {
        Command::AddCustomer {
            postal_code,
            name,
            latitude,
            longitude,
            tags,
            id,
        } => {
            let tags: BTreeSet<String> = tags.into_iter().collect();
            let mut customer =
                Customer::new(postal_code, name, Location::new(latitude, longitude), tags);
            if let Some(id) = id {
                customer = customer.with_id(id);
            }
            to_json(&store.insert_customer(customer).await?)
        }
        Command::Find {
            limit,
            display,
            postal_codes,
        } => {
            if display {
                to_json(&store.load_display_tuples_by_postal_codes(limit, postal_codes)?)
            } else {
                to_json(&store.find_by_postal_codes(limit, postal_codes)?)
            }
        }
        Command::Stats => to_json(&store.customer_stats()?),
        Command::Nuke { ids } => {
            let removed = store.nuke_customers(&ids).await?;
            to_json(&serde_json::json!({ "removed": removed }))
        }
        Command::AddThingy { id, version_code } => {
            let thingy = match id {
                Some(id) => VersionedThingy::with_version(id, version_code),
                None => VersionedThingy::with_version(VersionedThingy::new().id(), version_code),
            };
            to_json(&store.insert_thingy(thingy).await?)
        }
        Command::Thingy { id, version_code } => match version_code {
            Some(version_code) => to_json(&store.find_thingy(&id, version_code)?),
            None => to_json(&store.find_thingy_versions(&id)?),
        },
    }
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("stuffctl").chain(args.iter().copied())).unwrap()
    }

    async fn memory_store() -> (Database, StuffStore) {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        (db, store)
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_customer_with_negative_longitude_and_tags() {
        let cli = parse(&[
            "--in-memory",
            "add-customer",
            "--postal-code",
            "10001",
            "--name",
            "Fearless Girl",
            "--latitude",
            "40.7047282",
            "--longitude",
            "-74.0148544",
            "--tag",
            "bronze",
            "--tag",
            "sculpture",
        ]);

        assert!(cli.in_memory);
        assert!(cli.database_config().in_memory);
        match cli.command {
            Command::AddCustomer {
                longitude, tags, id, ..
            } => {
                assert!((longitude + 74.014_854_4).abs() < 1e-9);
                assert_eq!(tags, vec!["bronze", "sculpture"]);
                assert!(id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn version_flag_reports_the_tool_version_on_every_command() {
        for args in [
            vec!["stuffctl", "--version"],
            vec!["stuffctl", "add-thingy", "--version"],
            vec!["stuffctl", "thingy", "--version"],
        ] {
            let err = Cli::try_parse_from(args.iter().copied()).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion, "{args:?}");
        }
    }

    #[test]
    fn thingy_version_code_accepts_negative_numbers() {
        match parse(&["add-thingy", "--id", "t", "--version-code", "-3"]).command {
            Command::AddThingy { id, version_code } => {
                assert_eq!(id.as_deref(), Some("t"));
                assert_eq!(version_code, -3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        match parse(&["thingy", "t"]).command {
            Command::Thingy { version_code, .. } => assert!(version_code.is_none()),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn find_requires_postal_codes() {
        let result = Cli::try_parse_from(["stuffctl", "find", "--limit", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn db_flag_selects_durable_file() {
        let cli = parse(&["--db", "custom.redb", "stats"]);
        assert_eq!(cli.db, PathBuf::from("custom.redb"));
        assert_eq!(cli.database_config(), DatabaseConfig::durable("custom.redb"));
    }

    #[tokio::test]
    async fn add_find_stats_and_nuke_round_trip() {
        let (_db, store) = memory_store().await;

        let added = run(
            &store,
            parse(&[
                "add-customer",
                "--id",
                "c-1",
                "--postal-code",
                "10001",
                "--name",
                "Fearless Girl",
                "--latitude",
                "1.5",
                "--longitude",
                "2.5",
            ])
            .command,
        )
        .await
        .unwrap();
        let added: serde_json::Value = serde_json::from_str(&added).unwrap();
        assert_eq!(added["id"], "c-1");
        assert!(added["creationDate"].is_i64());

        let found = run(&store, parse(&["find", "--display", "10001"]).command)
            .await
            .unwrap();
        let found: serde_json::Value = serde_json::from_str(&found).unwrap();
        assert_eq!(
            found,
            serde_json::json!([{ "id": "c-1", "displayName": "Fearless Girl" }])
        );

        let stats = run(&store, Command::Stats).await.unwrap();
        let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
        assert_eq!(stats, serde_json::json!({ "count": 1, "max": "10001" }));

        let nuked = run(&store, parse(&["nuke", "c-1", "missing"]).command)
            .await
            .unwrap();
        let nuked: serde_json::Value = serde_json::from_str(&nuked).unwrap();
        assert_eq!(nuked["removed"], 1);
    }

    #[tokio::test]
    async fn thingy_without_version_lists_all_versions() {
        let (_db, store) = memory_store().await;
        run(&store, parse(&["add-thingy", "--id", "t", "--version-code", "2"]).command)
            .await
            .unwrap();
        run(&store, parse(&["add-thingy", "--id", "t"]).command)
            .await
            .unwrap();

        let all = run(&store, parse(&["thingy", "t"]).command).await.unwrap();
        let all: serde_json::Value = serde_json::from_str(&all).unwrap();
        assert_eq!(
            all,
            serde_json::json!([
                { "id": "t", "versionCode": 1 },
                { "id": "t", "versionCode": 2 }
            ])
        );

        let missing = run(&store, parse(&["thingy", "t", "--version-code", "9"]).command)
            .await
            .unwrap();
        assert_eq!(missing, "null");
    }
}
