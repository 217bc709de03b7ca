pub mod config;
pub mod cpu;
pub mod debugger;
pub mod error;
pub mod host;
pub mod memory;
pub mod target;
