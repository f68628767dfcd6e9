pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;
pub mod uploads;
