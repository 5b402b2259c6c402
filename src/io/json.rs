use super::{ensure_filedir, exclude_fields, plain_path};
use crate::logging::Report;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Load a JSON document
pub fn from_json<T: DeserializeOwned>(filepath: impl AsRef<Path>, report: &dyn Report) -> Result<T> {
    let path = plain_path(filepath)?;
    report.report(&format!("Load data from {} ...", path.display()));

    let file =
        File::open(&path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))
}

/// Dump data as pretty JSON (4-space indent), leaving out `exclude` fields
pub fn to_json<T: Serialize>(
    filepath: impl AsRef<Path>,
    data: &T,
    exclude: &[&str],
    report: &dyn Report,
) -> Result<()> {
    let path = ensure_filedir(filepath)?;
    report.report(&format!("Dump data to {} ...", path.display()));

    if exclude.is_empty() {
        return write_pretty(&path, data);
    }

    let mut value = serde_json::to_value(data).context("Failed to serialize data")?;
    exclude_fields(&mut value, exclude)?;
    write_pretty(&path, &value)
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    data.serialize(&mut serializer)
        .with_context(|| format!("Failed to write JSON: {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
