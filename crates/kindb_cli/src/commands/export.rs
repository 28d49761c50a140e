//! Export command implementation.

use kindb_core::{RecordKind, Serializer};
use std::io::Write;
use std::path::Path;

use super::open_read_only;
use crate::error::CliResult;

/// Writes every record of `kind` as one JSON object per line. Returns the
/// number of records written.
pub fn export_to(path: &Path, kind: &str, out: &mut dyn Write) -> CliResult<usize> {
    let kind: RecordKind = kind.parse()?;
    let mut store = open_read_only(path)?;
    let mut written = 0;
    for record in store.iter(kind)? {
        let bytes = record?.encode(Serializer::Json).map_err(kindb_core::CoreError::from)?;
        out.write_all(&bytes)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    store.close()?;
    Ok(written)
}

/// Runs the export command.
pub fn run(path: &Path, kind: &str) -> CliResult<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    export_to(path, kind, &mut out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindb_testkit::{household, TestStore};

    #[test]
    fn exports_one_json_object_per_line() {
        let mut store = TestStore::sqlite();
        household(&mut store, "Berg");
        store.close().unwrap();

        let mut out = Vec::new();
        let written = export_to(store.path().unwrap(), "person", &mut out).unwrap();
        assert_eq!(written, 3);
        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|v| v["primary_name"]["surname_list"][0]["surname"] == "Berg"));
    }
}
