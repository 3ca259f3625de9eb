#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::clock::SystemClock;
use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::model::db::poll::PollSweeperFairing;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Assemble the server: fairings, managed state, routes and catchers.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(PollSweeperFairing::default())
        .manage(SystemClock::shared())
        .mount("/", api::routes())
        .register("/", api::catchers())
}

#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name, so that tests never see each other's data.
#[cfg(test)]
fn database() -> String {
    use rand::Rng;
    format!("test_{:016x}", rand::thread_rng().gen::<u64>())
}

/// The server as under test: no background sweeps, everything else as normal.
#[cfg(test)]
async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    rocket::build()
        .attach(ConfigFairing)
        .manage(db_client)
        .manage(db)
        .manage(SystemClock::shared())
        .mount("/", api::routes())
        .register("/", api::catchers())
}
