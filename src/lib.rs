pub mod config;
pub mod error;
pub mod registry;
pub mod scheme;
pub mod server;
pub mod store;
pub mod toast;
pub mod wns;

#[cfg(test)]
mod testing;
