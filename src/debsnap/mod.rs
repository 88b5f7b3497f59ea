pub mod config;
pub mod control;
pub mod fetch;
pub mod group;
pub mod http;
pub mod instant;
pub mod layout;
pub mod resolver;
pub mod store;
pub mod version;
pub mod walker;

#[cfg(test)]
pub mod testing;
