//! Operator tool for the polling backend: mint session tokens for testing
//! and run the expired-poll sweep by hand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;
use thiserror::Error;

use civic_polls_backend::{
    clock::{FixedClock, SharedClock, SystemClock},
    config::{Config, DEFAULT_DATABASE},
    error::Error as BackendError,
    model::{
        api::auth::{AuthToken, Rights},
        db::poll::{close_expired_polls, find_expired_polls, PollSchedule},
        mongodb::Coll,
    },
};

const PROGRAM_NAME: &str = "poll-admin";

const ABOUT_TEXT: &str = "Operator tool for the civic polls backend.

EXIT CODES:
     0: Success.
     1: Error.";

const TOKEN: &str = "token";
const SWEEP: &str = "sweep";

const USER_ID: &str = "user-id";
const EMAIL: &str = "email";
const ADMIN: &str = "admin";
const SECRET: &str = "secret";
const TTL: &str = "ttl";
const DB_URI: &str = "db-uri";
const DATABASE: &str = "database";
const DRY_RUN: &str = "dry-run";
const AT: &str = "at";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let token = Command::new(TOKEN)
        .about("Mint a session token as the session provider would")
        .arg(Arg::new(USER_ID).long(USER_ID).required(true).help("Subject of the token"))
        .arg(Arg::new(EMAIL).long(EMAIL).required(true))
        .arg(
            Arg::new(ADMIN)
                .long(ADMIN)
                .action(ArgAction::SetTrue)
                .help("Grant administrator rights"),
        )
        .arg(
            Arg::new(SECRET)
                .long(SECRET)
                .required(true)
                .help("The server's `jwt_secret`"),
        )
        .arg(
            Arg::new(TTL)
                .long(TTL)
                .value_parser(value_parser!(u32))
                .default_value("3600")
                .help("Token lifetime in seconds"),
        );

    let sweep = Command::new(SWEEP)
        .about("Close every open poll whose end time has passed")
        .arg(Arg::new(DB_URI).long(DB_URI).required(true))
        .arg(Arg::new(DATABASE).long(DATABASE).default_value(DEFAULT_DATABASE))
        .arg(
            Arg::new(DRY_RUN)
                .long(DRY_RUN)
                .action(ArgAction::SetTrue)
                .help("Only list the polls that would be closed"),
        )
        .arg(
            Arg::new(AT)
                .long(AT)
                .help("Sweep as of this RFC 3339 time instead of now"),
        );

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .subcommand(token)
        .subcommand(sweep)
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Invalid time '{0}': {1}")]
    Time(String, chrono::ParseError),
    #[error("Could not reach the database: {0}")]
    Connect(#[from] mongodb::error::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Sign a token for the requested user.
fn mint_token(args: &ArgMatches) -> Result<String, Error> {
    // Required arguments and defaults are guaranteed to be present.
    let user_id: &String = args.get_one(USER_ID).unwrap();
    let email: &String = args.get_one(EMAIL).unwrap();
    let secret: &String = args.get_one(SECRET).unwrap();
    let ttl: u32 = *args.get_one(TTL).unwrap();
    let rights = Rights::from(args.get_flag(ADMIN));

    let config = Config::new(secret.as_str(), ttl, 0);
    let jwt = AuthToken::new(user_id.as_str(), email.as_str(), rights).encode(&config, Utc::now())?;
    Ok(jwt)
}

/// Run one sweep, returning a line per affected poll.
async fn sweep(args: &ArgMatches) -> Result<Vec<String>, Error> {
    let clock: SharedClock = match args.get_one::<String>(AT) {
        Some(at) => {
            let at = DateTime::parse_from_rfc3339(at).map_err(|e| Error::Time(at.clone(), e))?;
            Arc::new(FixedClock(at.with_timezone(&Utc)))
        }
        None => SystemClock::shared(),
    };
    let db_uri: &String = args.get_one(DB_URI).unwrap();
    let database: &String = args.get_one(DATABASE).unwrap();

    let client = Client::with_uri_str(db_uri).await?;
    let schedules = Coll::<PollSchedule>::from_db(&client.database(database));
    let now = clock.now();
    let (verb, ids) = if args.get_flag(DRY_RUN) {
        ("Would close", find_expired_polls(&schedules, now).await?)
    } else {
        ("Closed", close_expired_polls(&schedules, now).await?)
    };
    Ok(ids.into_iter().map(|id| format!("{verb} poll {id}")).collect())
}

/// Run the requested subcommand, report the result, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    let result = match args.subcommand() {
        Some((TOKEN, sub)) => mint_token(sub).map(|jwt| vec![jwt]),
        Some((SWEEP, sub)) => sweep(sub).await,
        _ => unreachable!("clap requires a known subcommand"),
    };
    match result {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_blocking(args: &ArgMatches) -> u8 {
        rocket::tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(run(args))
    }

    #[test]
    fn minted_tokens_verify() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["civic_polls_backend"], None, None);

        let command_line = [
            PROGRAM_NAME, TOKEN, "--user-id", "u42", "--email", "u42@example.org", "--admin",
            "--secret", "s3cret", "--ttl", "60",
        ];
        let args = cli().try_get_matches_from(command_line).unwrap();
        let (_, sub) = args.subcommand().unwrap();
        let jwt = mint_token(sub).unwrap();

        let token = AuthToken::decode(&jwt, &Config::new("s3cret", 60, 0)).unwrap();
        assert_eq!(token.user_id, "u42");
        assert_eq!(token.email, "u42@example.org");
        assert_eq!(token.rights, Rights::Admin);
        assert!(AuthToken::decode(&jwt, &Config::new("other", 60, 0)).is_err());

        assert_eq!(run_blocking(&args), 0);
    }

    #[test]
    fn users_by_default() {
        let command_line = [PROGRAM_NAME, TOKEN, "--user-id", "u1", "--email", "e", "--secret", "s"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        let (_, sub) = args.subcommand().unwrap();
        let jwt = mint_token(sub).unwrap();
        let token = AuthToken::decode(&jwt, &Config::new("s", 3600, 0)).unwrap();
        assert_eq!(token.rights, Rights::User);
    }

    #[test]
    fn bad_sweep_time_fails() {
        let command_line = [
            PROGRAM_NAME, SWEEP, "--db-uri", "mongodb://localhost:27017", "--at", "yesterday",
        ];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run_blocking(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // No subcommand.
        cli().try_get_matches_from([PROGRAM_NAME]).unwrap_err();

        // Missing required arguments.
        cli().try_get_matches_from([PROGRAM_NAME, TOKEN, "--user-id", "u1"]).unwrap_err();
        cli().try_get_matches_from([PROGRAM_NAME, SWEEP]).unwrap_err();

        // Not a number.
        let command_line = [
            PROGRAM_NAME, TOKEN, "--user-id", "u", "--email", "e", "--secret", "s", "--ttl", "soon",
        ];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
