//! Busly command-line client.
//!
//! A thin shell over `busly-core` for exercising the backend from a terminal:
//! sign in with an emailed code, inspect the session, browse stations.

use anyhow::{bail, Context};
use busly_core::stations::DEFAULT_NEARBY_LIMIT;
use busly_core::trip_search::Direction;
use busly_core::{
    fuzzy_search, nearest, ApiClient, ApiConfig, AuthSession, Database, GeoPoint, SearchState,
    Settings, SqliteSecureStore, StationService, TokenStore,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;

/// Busly bus-ticket client
#[derive(Parser, Debug)]
#[command(name = "busly")]
#[command(about = "Command-line front end for the Busly backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Show the current session
    Status,
    /// Email a one-time sign-in code
    SendCode { email: String },
    /// Sign in with an emailed code
    Verify { email: String, code: String },
    /// Fetch the signed-in profile
    Me,
    /// Sign out
    Logout,
    /// List stations, optionally fuzzy-filtered
    Stations { query: Option<String> },
    /// Stations closest to a position
    Nearby {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Pick origin and destination for the next search
    Search { from: String, to: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("busly=debug".parse()?)
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Busly v{}", busly_core::VERSION);

    let db = Database::open().context("Failed to open database")?;
    db.migrate()?;
    let settings = Settings::load(&db);
    let config = ApiConfig::resolve(&settings);

    let store = Arc::new(SqliteSecureStore::new(Database::open_at(db.path().clone())?)?);
    let tokens = TokenStore::new(store.clone(), busly_core::system_clock());
    let client = Arc::new(ApiClient::new(&config, tokens)?);
    let session = AuthSession::new(client.clone(), store);
    session.initialize().await;

    match cli.command {
        Command::Status => print_status(&session),
        Command::SendCode { email } => {
            let message = session
                .send_code(&email)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{message}");
        }
        Command::Verify { email, code } => {
            let user = session
                .verify_code(&email, &code)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Signed in as {}", user.display_name());
        }
        Command::Me => {
            if !session.is_authenticated() {
                bail!("Not signed in");
            }
            let user: busly_core::User = client.get_json("/auth/me").await?;
            session.set_user(user.clone())?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Logout => {
            session.logout().await;
            println!("Signed out");
        }
        Command::Stations { query } => {
            let stations = StationService::new(client).all_stations().await?;
            match query {
                Some(query) => {
                    for station in fuzzy_search(&stations, &query) {
                        println!("{:<28} {}", station.name, station.city);
                    }
                }
                None => {
                    for station in &stations {
                        println!("{:<28} {}", station.name, station.city);
                    }
                }
            }
        }
        Command::Nearby { lat, lng } => {
            let stations = StationService::new(client).all_stations().await?;
            for entry in nearest(&stations, GeoPoint::new(lat, lng), DEFAULT_NEARBY_LIMIT) {
                println!(
                    "{:>7.1} km  {:<28} {}",
                    entry.distance_km, entry.station.name, entry.station.city
                );
            }
        }
        Command::Search { from, to } => {
            let stations = StationService::new(client).all_stations().await?;
            let mut search = SearchState::load(&db);
            for (direction, query) in [(Direction::From, &from), (Direction::To, &to)] {
                let Some(station) = fuzzy_search(&stations, query).into_iter().next() else {
                    bail!("No station matches {query:?}");
                };
                search.select_station(direction, station);
            }
            search.save(&db)?;
            println!(
                "{} ({}) -> {} ({}) on {}",
                search.from,
                search.from_city,
                search.to,
                search.to_city,
                search.departure_date.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

fn print_status(session: &AuthSession) {
    let snapshot = session.snapshot();
    match (&snapshot.user, snapshot.is_authenticated) {
        (Some(user), true) => println!("Signed in as {}", user.display_name()),
        (None, true) => println!("Signed in (profile not loaded)"),
        _ => println!("Signed out"),
    }
    if let Some(error) = snapshot.error {
        println!("Last error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("busly").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_verify() {
        assert_eq!(
            parse(&["verify", "ana@example.com", "123456"]).unwrap(),
            Command::Verify {
                email: "ana@example.com".to_string(),
                code: "123456".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_send_code_is_kebab_case() {
        assert_eq!(
            parse(&["send-code", "ana@example.com"]).unwrap(),
            Command::SendCode {
                email: "ana@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_stations_query_is_optional() {
        assert_eq!(
            parse(&["stations"]).unwrap(),
            Command::Stations { query: None }
        );
        assert_eq!(
            parse(&["stations", "skop"]).unwrap(),
            Command::Stations {
                query: Some("skop".to_string())
            }
        );
    }

    #[test]
    fn test_nearby_accepts_negative_coordinates() {
        assert_eq!(
            parse(&["nearby", "-33.87", "151.21"]).unwrap(),
            Command::Nearby {
                lat: -33.87,
                lng: 151.21
            }
        );
    }

    #[test]
    fn test_nearby_rejects_non_numeric_latitude() {
        let err = parse(&["nearby", "north", "21.4"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_missing_arguments_are_rejected() {
        assert!(parse(&["verify", "ana@example.com"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
