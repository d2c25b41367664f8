//! Core domain types and sync logic.

pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod gaps;
pub mod instrument;
pub mod observation;
pub mod reconcile;
pub mod store;
pub mod sync;
pub mod sync_config;
