use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    identity::Normalizer,
    mail::{Mailer, SmtpMailer},
    mongodb::ensure_indexes_exist,
    store::{mongo::MongoStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    public_url: String,
    auth_ttl: u32,
    #[serde(default = "default_reset_ttl")]
    reset_ttl: u32,
    // secrets
    jwt_secret: String,
    provider_secret: String,
}

fn default_reset_ttl() -> u32 {
    3600
}

impl Config {
    /// Base URL of the site, without a trailing slash.
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Valid lifetime of password reset tokens in seconds.
    pub fn reset_ttl(&self) -> Duration {
        Duration::seconds(self.reset_ttl.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key shared with the external sign-in handshake, used to
    /// verify its assertions.
    pub fn provider_secret(&self) -> &[u8] {
        self.provider_secret.as_bytes()
    }

    /// The link emailed to a voter to redeem `raw_token`.
    pub fn reset_link(&self, raw_token: &str) -> String {
        format!("{}/reset-password?token={raw_token}", self.public_url())
    }
}


/// A fairing that loads the application config and puts it in managed state,
/// along with the identity normalizer.
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
        rocket = rocket.manage(config).manage(Normalizer::default());
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
/// performs any setup necessary, and places a [`Store`] into managed state.
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

        // Ensure the required indexes exist, above all the unique identity index.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: Store = Arc::new(MongoStore::new(client, &db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Get the name of the database to use.
pub fn get_database_name() -> String {
    "teamvote".to_string()
}

/// Configuration for the outbound mail relay.
#[derive(Deserialize)]
struct MailConfig {
    // non-secrets
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    smtp_username: String,
    mail_from: String,
    // secrets
    smtp_password: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// A fairing that loads the mail config and places a [`Mailer`] into
/// managed state.
pub struct MailFairing;

#[rocket::async_trait]
impl Fairing for MailFairing {
    fn info(&self) -> Info {
        Info {
            name: "SMTP",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<MailConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mail config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the transport. No connection is made until the first send.
        let mailer = match SmtpMailer::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_username,
            config.smtp_password,
            &config.mail_from,
        ) {
            Ok(mailer) => mailer,
            Err(e) => {
                error!("Failed to configure mail relay: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded SMTP config for {}", config.smtp_host);

        // Manage the state.
        let mailer: Mailer = Arc::new(mailer);
        rocket = rocket.manage(mailer);
        Ok(rocket)
    }
}
