//! Concrete adapter implementations for ports.

pub mod console_report_adapter;
pub mod csv_source_adapter;
pub mod file_config_adapter;
pub mod json_store_adapter;
