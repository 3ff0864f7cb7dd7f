use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::ledger::{GatewayLedger, LedgerState, MemoryLedger, MirrorWriters};
use crate::model::mongodb::{
    ensure_election_ordinal_counter_exists, ensure_indexes_exist, Coll,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_confirm_interval")]
    confirm_interval_secs: u32,
    #[serde(default = "default_confirm_attempts")]
    confirm_attempts: u32,
    // secrets
    jwt_secret: String,
}

fn default_confirm_interval() -> u32 {
    5
}

fn default_confirm_attempts() -> u32 {
    24
}

impl Config {
    /// Secret shared with the identity service, used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// How long to wait between polls of a pending ledger transaction.
    pub fn confirm_interval(&self) -> Duration {
        Duration::seconds(self.confirm_interval_secs.into())
    }

    /// How many polls to attempt before declaring the outcome unknown.
    pub fn confirm_attempts(&self) -> u32 {
        self.confirm_attempts
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the unique indexes exist; the double-vote guard depends
        // on them.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Ensure the election ordinal counter exists.
        let counters = Coll::from_db(&db);
        if let Err(e) = ensure_election_ordinal_counter_exists(&counters).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "univote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the ledger gateway.
#[derive(Deserialize)]
struct LedgerConfig {
    /// Base URL of the chain-gateway service. Absent means the ledger
    /// mirror is disabled and the relational store stands alone; the
    /// special value `memory` selects the in-process ledger, for local
    /// development without a chain.
    #[serde(default)]
    ledger_url: Option<String>,
}

/// A fairing that configures the (possibly absent) vote ledger and the
/// confirmation watchers, and places both into managed state.
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Vote Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<LedgerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load ledger config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let ledger = match config.ledger_url.as_deref() {
            None => {
                info!("No ledger configured; running on the relational store alone");
                LedgerState::disabled()
            }
            Some("memory") => {
                info!("Using the in-process ledger");
                LedgerState::configured(Arc::new(MemoryLedger::with_auto_confirm(true)))
            }
            Some(url) => {
                info!("Using the ledger gateway at {url}");
                LedgerState::configured(Arc::new(GatewayLedger::new(url)))
            }
        };

        // Manage the state.
        rocket = rocket.manage(ledger).manage(MirrorWriters::new());
        Ok(rocket)
    }
}
