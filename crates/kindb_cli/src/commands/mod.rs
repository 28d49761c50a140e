//! CLI command implementations.

pub mod check;
pub mod export;
pub mod list;
pub mod rebuild;
pub mod summary;
pub mod upgrade;

use kindb_core::{Config, Store};
use serde::Serialize;
use std::path::Path;

use crate::error::CliResult;

/// Opens an existing store without taking the lock.
pub fn open_read_only(path: &Path) -> CliResult<Store> {
    Ok(Store::open(path, Config::default().create_if_missing(false).read_only(true))?)
}

/// Opens an existing store for writing.
pub fn open_writable(path: &Path, allow_upgrade: bool) -> CliResult<Store> {
    Ok(Store::open(
        path,
        Config::default().create_if_missing(false).allow_upgrade(allow_upgrade),
    )?)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
