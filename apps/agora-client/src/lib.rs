pub mod cli;
pub mod comment_tree;
pub mod config;
pub mod connection;
pub mod error;
pub mod sort;
pub mod telemetry;
pub mod unread;
pub mod views;
pub mod vote;

pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use error::ClientError;
