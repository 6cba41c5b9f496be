//! Connection management module

pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod handshake;
pub mod login;

pub use builder::ClientBuilder;
pub use client::ExoClient;
pub use config::ClientConfig;
pub use connection::Connection;
