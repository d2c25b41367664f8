//! Port traits at the boundary between the sync engine and the outside world.

pub mod config_port;
pub mod quote_source;
pub mod report_port;
pub mod store_port;
