#![doc = include_str!("../README.md")]

mod error;
pub use error::{Error, RequestCategory};

pub mod client;
pub mod config;
pub mod content;
pub mod headers;
pub mod list;
pub mod progress;
pub mod types_rs;
pub mod web_api_client;
pub mod webifier;

pub use client::StorageClient;
pub use config::ClientConfig;
