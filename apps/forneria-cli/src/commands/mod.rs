//! # CLI Commands
//!
//! One module per command group. Every command takes the open
//! [`Database`](forneria_db::Database) and the [`AppConfig`](crate::config::AppConfig)
//! and returns a serializable value that `main` prints as JSON.
//!
//! - [`sale`] - create, edit, delete and inspect sales
//! - [`stock`] - inventory movements and history
//! - [`seed`] - development data

pub mod sale;
pub mod seed;
pub mod stock;

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Reads a JSON document from `path`, or from stdin when no path is given.
pub fn read_json<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, ApiError> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    parse_json(&raw)
}

pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, ApiError> {
    Ok(serde_json::from_str(raw)?)
}
