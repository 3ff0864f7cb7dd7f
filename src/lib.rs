#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod scheduled_task;

use config::{ConfigFairing, DatabaseFairing, LedgerFairing};
use logging::LoggerFairing;

/// Construct the server. All connection and setup work happens during
/// ignition, in the attached fairings.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(LedgerFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}
