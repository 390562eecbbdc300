pub mod config;
pub mod shutdown;
pub mod transfer;
