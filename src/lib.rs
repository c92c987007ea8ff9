#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing, MailFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;

/// Build the server: routes plus the fairings that load config and
/// connect to the database and mail relay.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(MailFairing)
}

/// A server over the given store and mailer, with example config.
#[cfg(test)]
pub(crate) fn rocket_for(
    store: model::store::Store,
    mailer: model::mail::Mailer,
) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(config::Config::example())
        .manage(model::identity::Normalizer::default())
        .manage(store)
        .manage(mailer)
}

/// A server over the in-memory store, for route tests. The store and mailer
/// are returned for inspection.
#[cfg(test)]
pub(crate) async fn memory_client() -> (
    rocket::local::asynchronous::Client,
    std::sync::Arc<model::store::memory::MemoryStore>,
    std::sync::Arc<model::mail::recording::RecordingMailer>,
) {
    use std::sync::Arc;

    let store = Arc::new(model::store::memory::MemoryStore::new());
    let mailer = Arc::new(model::mail::recording::RecordingMailer::default());
    let client = rocket::local::asynchronous::Client::tracked(rocket_for(
        store.clone(),
        mailer.clone(),
    ))
    .await
    .unwrap();
    (client, store, mailer)
}

/// Connect to the test database deployment. Must be a replica set, as
/// votes are recorded in transactions.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = std::env::var("ROCKET_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name, so tests cannot collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// A server over a MongoDB-backed store in the named database.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use std::sync::Arc;

    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    let store: model::store::Store = Arc::new(model::store::mongo::MongoStore::new(client, &db));
    let mailer: model::mail::Mailer = Arc::new(model::mail::recording::RecordingMailer::default());
    rocket_for(store, mailer)
}
