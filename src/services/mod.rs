pub mod catalog;
pub mod discovery;
pub mod ledger;
pub mod locator;
pub mod monitor;
pub mod pipeline;
pub mod toast_watcher;
