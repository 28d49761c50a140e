//! Summary command implementation.

use kindb_core::StoreSummary;
use std::path::Path;

use super::{open_read_only, print_json};
use crate::error::CliResult;

/// Reads the summary of the store at `path`.
pub fn collect(path: &Path) -> CliResult<StoreSummary> {
    let mut store = open_read_only(path)?;
    let summary = store.summary()?;
    store.close()?;
    Ok(summary)
}

/// Runs the summary command.
pub fn run(path: &Path, json: bool) -> CliResult<()> {
    let summary = collect(path)?;
    if json {
        return print_json(&summary);
    }
    print_text_output(&summary);
    Ok(())
}

fn print_text_output(summary: &StoreSummary) {
    println!("Store Summary");
    println!("=============");
    if let Some(path) = &summary.path {
        println!("  Path:           {path}");
    }
    println!("  Backend:        {}", summary.backend);
    println!("  Serializer:     {}", summary.serializer);
    println!("  Schema version: {}", summary.schema_version);
    println!("  Locale:         {}", summary.locale);
    println!("  Surnames:       {}", summary.surnames);
    println!();
    println!("Records:");
    for (table, count) in &summary.counts {
        println!("  {table:<12} {count}");
    }
}
