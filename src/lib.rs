#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

/// The server, configured from `Rocket.toml` and `ROCKET_*` environment
/// variables.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build(), StoreFairing::FromConfig)
}

fn assemble(rocket: Rocket<Build>, store: StoreFairing) -> Rocket<Build> {
    rocket
        .mount("/api", api::routes())
        .register("/api", api::catchers())
        .attach(ConfigFairing)
        .attach(store)
        .attach(LoggerFairing)
}

/// A server over the given store, with fixed secrets and the example admin.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: store::Store) -> Rocket<Build> {
    let admin = model::api::admin::AdminCredentials::example();
    let figment = rocket::Config::figment()
        .merge(("log_level", "off"))
        .merge(("auth_ttl", 3600))
        .merge(("observer_buffer", 16))
        .merge(("seed", false))
        .merge(("jwt_secret", "test jwt secret"))
        .merge(("hmac_secret", "test hmac secret"))
        .merge(("admin_username", admin.username))
        .merge(("admin_password", admin.password));
    assemble(rocket::custom(figment), StoreFairing::Provided(store))
}
