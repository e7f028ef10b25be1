pub extern crate actix_web;

pub mod config;
pub mod connection;
pub mod connection_tx_storage;
pub mod error;
pub mod handlers;
pub mod server;
