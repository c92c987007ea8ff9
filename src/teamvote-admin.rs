//! Administrative tasks run directly against the database: seeding the
//! ballot, auditing tallies, and backfilling canonical identities.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;
use rocket::serde::json::serde_json;

use teamvote_backend::config::get_database_name;
use teamvote_backend::model::{
    db::candidate::NewCandidate,
    identity::Normalizer,
    mongodb::ensure_indexes_exist,
    store::{mongo::MongoStore, CredentialStore},
};
use teamvote_backend::service::audit::{reconcile, renormalize_identities};

const PROGRAM_NAME: &str = "teamvote-admin";

const ABOUT_TEXT: &str = "Administer a TeamVote database.

The database is located using the same `db_uri` setting as the server
(`Rocket.toml` or `ROCKET_DB_URI`).

EXIT CODES:
     0: Success.
   255: Ran successfully, but the tallies are inconsistent and were not corrected.
 Other: Error.";

const SEED: &str = "seed";
const RECONCILE: &str = "reconcile";
const BACKFILL: &str = "backfill";
const PATH: &str = "PATH";
const APPLY: &str = "apply";

const PATH_HELP: &str = "A JSON array of candidates, each with `name`, `description`,\n\
`profile_url` and `image_url`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(
            Command::new(SEED)
                .about("Add candidates to the ballot")
                .arg(
                    Arg::new(PATH)
                        .help(PATH_HELP)
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(RECONCILE)
                .about("Recompute tallies from the votes recorded on voters")
                .arg(
                    Arg::new(APPLY)
                        .long(APPLY)
                        .help("Overwrite any tally that has drifted")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new(BACKFILL)
                .about("Recompute every voter's canonical identity from their email"),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the seed file.
    Format(String),
    /// Missing or invalid config.
    Config(String),
    /// The database or an operation against it failed.
    Database(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IO(msg) => write!(f, "IO error: {msg}"),
            Self::Format(msg) => write!(f, "Invalid seed file: {msg}"),
            Self::Config(msg) => write!(f, "Invalid config: {msg}"),
            Self::Database(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

/// Connect using the server's config.
async fn connect() -> Result<MongoStore, Error> {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .map_err(|e| Error::Config(e.to_string()))?;
    let client = Client::with_uri_str(db_uri)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    let db = client.database(&get_database_name());
    ensure_indexes_exist(&db)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(MongoStore::new(client, &db))
}

async fn seed(store: &dyn CredentialStore, path: &str) -> Result<(), Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let candidates: Vec<NewCandidate> =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;
    let inserted = store
        .insert_candidates(candidates)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    for candidate in &inserted {
        println!("{}: {}", candidate.id, candidate.name);
    }
    println!(
        "Added {} candidate{}",
        inserted.len(),
        if inserted.len() != 1 { "s" } else { "" }
    );
    Ok(())
}

/// Returns whether the tallies are (now) consistent.
async fn run_reconcile(store: &dyn CredentialStore, apply: bool) -> Result<bool, Error> {
    let report = reconcile(store, apply)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    println!("{report}");
    Ok(report.is_consistent() || report.applied)
}

async fn backfill(store: &dyn CredentialStore) -> Result<(), Error> {
    let report = renormalize_identities(store, &Normalizer::default())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
    println!("Updated {} voter(s)", report.updated.len());
    for id in &report.collisions {
        println!("NEEDS REVIEW: voter {id} collided with an existing identity");
    }
    for id in &report.invalid {
        println!("NEEDS REVIEW: voter {id} has an invalid email");
    }
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<bool, Error> {
    let store = connect().await?;
    match matches.subcommand() {
        Some((SEED, args)) => {
            // Unwrap safe as the argument is required.
            let path = args.get_one::<String>(PATH).unwrap();
            seed(&store, path).await.map(|_| true)
        }
        Some((RECONCILE, args)) => run_reconcile(&store, args.get_flag(APPLY)).await,
        Some((BACKFILL, _)) => backfill(&store).await.map(|_| true),
        // Unreachable as a subcommand is required.
        _ => Ok(true),
    }
}

#[rocket::main]
async fn main() {
    let matches = cli().get_matches();

    match run(matches).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(-1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn reconcile_flag_parses() {
        let matches = cli().get_matches_from([PROGRAM_NAME, RECONCILE, "--apply"]);
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, RECONCILE);
        assert!(args.get_flag(APPLY));
    }
}
