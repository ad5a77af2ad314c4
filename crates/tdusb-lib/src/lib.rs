//! td-usb — host-side driver for Tokyo Devices USB HID instruments.

pub mod config;
pub mod context;
pub mod device;
pub mod devreg;
pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;

pub use error::TdError;
