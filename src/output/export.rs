//! Export of already-known server names
//!
//! After a run, the display names of every candidate that was already in
//! the store are written to a JSON side file as an ordered list of unique
//! strings, for manual inspection.

use crate::pipeline::RunReport;
use crate::LedgerError;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Merges the existing-name lists of several reports, keeping first-seen order
pub fn collect_existing_names(reports: &[RunReport]) -> Vec<String> {
    let mut seen = HashSet::new();
    reports
        .iter()
        .flat_map(|report| report.existing_names.iter())
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Writes `names` to `path` as a pretty-printed JSON array
pub fn export_names(names: &[String], path: &Path) -> Result<(), LedgerError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, names)?;
    writer.flush()?;
    info!("Exported {} server names to {}", names.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_merged_across_reports() {
        let mut first = RunReport::new("a");
        first.record_existing_name("Alpha");
        first.record_existing_name("Beta");
        let mut second = RunReport::new("b");
        second.record_existing_name("Beta");
        second.record_existing_name("Gamma");

        assert_eq!(
            collect_existing_names(&[first, second]),
            vec!["Alpha", "Beta", "Gamma"]
        );
    }

    #[test]
    fn test_export_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_servers.json");
        let names = vec!["Alpha".to_string(), "Beta".to_string()];

        export_names(&names, &path).unwrap();

        let written: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, names);
    }
}
