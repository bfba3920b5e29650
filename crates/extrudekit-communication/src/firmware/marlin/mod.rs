//! Marlin-style firmware support
//!
//! Command builders, reply parsing, the fixed informational query battery
//! and hotend temperature polling.

pub mod commands;
pub mod inventory;
pub mod monitor;
pub mod queries;
pub mod response_parser;

pub use inventory::{InventoryRecord, InventorySection, PrinterInventory, SectionLabel};
pub use monitor::TemperatureMonitor;
pub use queries::{query_extruder_steps, query_hotend_temperature, query_temperatures};
pub use response_parser::TemperatureReport;
