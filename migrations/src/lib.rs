#![forbid(unsafe_code)]
#![warn(
    clippy::cargo,
    // clippy::missing_docs_in_private_items,
    clippy::nursery,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![cfg_attr(doc, warn(rustdoc))]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::multiple_crate_versions,
    clippy::option_if_let_else,
    // Clippy is bugged
    clippy::use_self
)]

#[macro_use]
extern crate tracing;

pub mod backend;
pub mod chain;
pub mod config;
mod connection;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod migrator;
pub mod postgres;
pub mod schema;
pub mod step;

pub use self::{
    backend::{Direction, SchemaBackend},
    chain::{Chain, Target},
    config::Configuration,
    connection::{initialize, pool},
    error::{BackendError, ConfigurationError, MigrationError},
    migrator::{HistoryEntry, Migrator},
    step::Step,
};
pub use sqlx;
