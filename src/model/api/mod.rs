//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camel case.

pub mod admin;
pub mod auth;
pub mod contact;
pub mod election;
pub mod id;
pub mod live;
pub mod vote;
pub mod voter;
