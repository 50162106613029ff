use std::sync::Arc;

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::model::{api::admin::AdminCredentials, db::admin::NewAdmin};
use crate::service::{QueryService, VoteService};
use crate::store::{seed_sample_elections, MemoryStore, MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default = "default_observer_buffer")]
    observer_buffer: usize,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

fn default_observer_buffer() -> usize {
    64
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// How many updates may queue for one live observer before further
    /// updates to it are dropped.
    pub fn observer_buffer(&self) -> usize {
        self.observer_buffer
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key used to sign HMACs.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
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

/// Which store backs the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_db_name")]
    db_name: String,
    admin_username: Option<String>,
    /// Fill an empty store with sample elections on startup.
    #[serde(default)]
    seed: bool,
    // secrets
    db_uri: Option<String>,
    admin_password: Option<String>,
}

fn default_db_name() -> String {
    "livevote".to_string()
}

/// A fairing that sets up the store, performs any setup necessary, and places
/// the store, the broadcaster and the services built on them into managed
/// state.
pub enum StoreFairing {
    /// Build the store described by the configuration.
    FromConfig,
    /// Use an existing store.
    Provided(Store),
}

impl StoreFairing {
    async fn store(&self, config: &StoreConfig) -> std::result::Result<Store, String> {
        match self {
            Self::Provided(store) => Ok(store.clone()),
            Self::FromConfig => match config.store {
                StoreKind::Memory => {
                    warn!("Using the in-memory store; nothing will be persisted");
                    Ok(Arc::new(MemoryStore::new()))
                }
                StoreKind::Mongodb => {
                    let uri = config
                        .db_uri
                        .as_deref()
                        .ok_or_else(|| "`db_uri` must be set for the mongodb store".to_string())?;
                    info!("Connecting to database {}...", config.db_name);
                    let store = MongoStore::connect(uri, &config.db_name)
                        .await
                        .map_err(|e| format!("Failed to connect to database: {e}"))?;
                    info!("...database connection online!");
                    Ok(Arc::new(store))
                }
            },
        }
    }
}

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store = match self.store(&config).await {
            Ok(store) => store,
            Err(e) => {
                error!("{e}");
                return Err(rocket);
            }
        };

        // Ensure there is at least one admin user.
        if let Err(e) = ensure_admin_exists(&store, &config).await {
            error!("Failed to create the first admin: {e}");
            return Err(rocket);
        }

        if config.seed {
            if let Err(e) = seed(&store, &config).await {
                error!("Failed to seed sample elections: {e}");
                return Err(rocket);
            }
        }

        // Manage the state.
        let broadcaster = Broadcaster::new();
        rocket = rocket
            .manage(VoteService::new(store.clone(), broadcaster.clone()))
            .manage(QueryService::new(store.clone()))
            .manage(broadcaster)
            .manage(store);
        Ok(rocket)
    }
}

/// Create an admin from the configured credentials if there are no admins.
async fn ensure_admin_exists(store: &Store, config: &StoreConfig) -> Result<()> {
    if store.count_admins().await? > 0 {
        return Ok(());
    }
    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) => {
            let admin = NewAdmin::try_from(AdminCredentials {
                username: username.clone(),
                password: password.clone(),
            })?;
            store.insert_admin(admin).await?;
            info!("Created admin {username}");
        }
        _ => warn!("No admins exist and no admin credentials are configured"),
    }
    Ok(())
}

/// Seed sample elections, attributed to the configured admin.
async fn seed(store: &Store, config: &StoreConfig) -> Result<()> {
    let admin = match &config.admin_username {
        Some(username) => store.admin_by_username(username).await?,
        None => None,
    };
    let Some(admin) = admin else {
        warn!("Not seeding: the configured admin does not exist");
        return Ok(());
    };
    let seeded = seed_sample_elections(store, admin.id).await?;
    if seeded > 0 {
        info!("Seeded {seeded} sample elections");
    }
    Ok(())
}
