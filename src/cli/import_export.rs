//! Bulk load and extract between index files and headerless `key,value`
//! CSV files.

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::cli::CliError;
use crate::error::IndexError;
use crate::tree::BTree;

/// Summary statistics from a bulk load.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Rows inserted into the index.
    pub inserted: u64,
    /// Rows skipped because their key was already present.
    pub duplicates: u64,
    /// Rows skipped because they did not parse as two integers.
    pub malformed: u64,
}

/// Summary statistics from an extract.
#[derive(Debug, Clone, Default)]
pub struct ExtractSummary {
    /// Pairs written to the output file.
    pub exported: u64,
}

/// Insert every `key,value` row of a headerless CSV file.
///
/// Rows with the wrong shape and rows whose key is already present are
/// counted and skipped; any other engine failure aborts the load.
pub fn load_csv(tree: &mut BTree, path: &Path) -> Result<LoadSummary, CliError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut summary = LoadSummary::default();

    for result in reader.records() {
        let record = result?;
        let Some((key, value)) = parse_pair(&record) else {
            summary.malformed += 1;
            continue;
        };
        match tree.insert(key, value) {
            Ok(()) => summary.inserted += 1,
            Err(IndexError::DuplicateKey(_)) => summary.duplicates += 1,
            Err(err) => return Err(err.into()),
        }
    }
    debug!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        malformed = summary.malformed,
        "cli.load.done"
    );
    Ok(summary)
}

/// Write every pair of the index to `path` as `key,value` rows, ascending.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn extract_csv(tree: &mut BTree, path: &Path, force: bool) -> Result<ExtractSummary, CliError> {
    if path.exists() && !force {
        return Err(CliError::Message(format!(
            "output file {} already exists",
            path.display()
        )));
    }
    let mut writer = WriterBuilder::new().from_path(path)?;
    let mut summary = ExtractSummary::default();
    for (key, value) in tree.iter()? {
        writer.write_record(&[key.to_string(), value.to_string()])?;
        summary.exported += 1;
    }
    writer.flush()?;
    debug!(exported = summary.exported, "cli.extract.done");
    Ok(summary)
}

fn parse_pair(record: &StringRecord) -> Option<(u64, u64)> {
    if record.len() != 2 {
        return None;
    }
    let key = record.get(0)?.trim().parse().ok()?;
    let value = record.get(1)?.trim().parse().ok()?;
    Some((key, value))
}
