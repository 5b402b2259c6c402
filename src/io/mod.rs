//! Path and storage helpers
//!
//! Each read or write reports one status line through a [`Report`] sink.
//!
//! [`Report`]: crate::logging::Report

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

mod json;
mod lines;
mod object;

pub use json::{from_json, to_json};
pub use lines::{Lines, count_lines, read_lines, write_lines};
pub use object::{
    Detach, Detached, dump_object, dump_object_excluding, load_object, restore_field, take_field,
};

/// Expand a leading `~` and make the path absolute
pub fn plain_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .context("Cannot expand '~': home directory is unknown")?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    std::path::absolute(&expanded)
        .with_context(|| format!("Failed to resolve path: {}", expanded.display()))
}

/// Create a directory and its parents if missing
pub fn ensure_dir(dirpath: impl AsRef<Path>) -> Result<PathBuf> {
    let dirpath = plain_path(dirpath)?;
    std::fs::create_dir_all(&dirpath)
        .with_context(|| format!("Failed to create directory: {}", dirpath.display()))?;
    Ok(dirpath)
}

/// Make sure the parent directory of a file exists
pub fn ensure_filedir(filepath: impl AsRef<Path>) -> Result<PathBuf> {
    let filepath = plain_path(filepath)?;
    if let Some(parent) = filepath.parent() {
        ensure_dir(parent)?;
    }
    Ok(filepath)
}

/// Remove a directory with all its content and recreate it empty
pub fn clear_dir(dirpath: impl AsRef<Path>) -> Result<PathBuf> {
    let dirpath = plain_path(dirpath)?;
    if dirpath.exists() {
        std::fs::remove_dir_all(&dirpath)
            .with_context(|| format!("Failed to remove directory: {}", dirpath.display()))?;
    }
    ensure_dir(dirpath)
}

/// Insert `suffix` between file stem and extension: `a/b.txt` -> `a/b_v2.txt`
pub fn suffix_filename(filepath: impl AsRef<Path>, suffix: &str) -> PathBuf {
    let filepath = filepath.as_ref();
    let stem = filepath
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match filepath.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    filepath.with_file_name(name)
}

/// Fill `{key}` placeholders in a path
pub fn format_path(path: impl AsRef<Path>, values: &[(&str, &str)]) -> Result<PathBuf> {
    let placeholder = Regex::new(r"\{(\w+)\}")?;
    let template = path.as_ref().to_string_lossy();

    let mut missing = Vec::new();
    let formatted = placeholder.replace_all(&template, |caps: &regex::Captures| {
        let key = &caps[1];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => value.to_string(),
            None => {
                missing.push(key.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        bail!("No value for path placeholders: {}", missing.join(", "));
    }
    Ok(PathBuf::from(formatted.into_owned()))
}

/// Remove dotted field paths (`cache`, `model.weights`) from a serialized value
pub(crate) fn exclude_fields(value: &mut Value, exclude: &[&str]) -> Result<()> {
    for field in exclude {
        let mut parts: Vec<&str> = field.split('.').collect();
        let Some(last) = parts.pop() else {
            continue;
        };

        let mut current = &mut *value;
        for part in parts {
            current = current
                .get_mut(part)
                .with_context(|| format!("Excluded field '{field}' not found"))?;
        }

        let removed = current
            .as_object_mut()
            .and_then(|object| object.shift_remove(last));
        if removed.is_none() {
            bail!("Excluded field '{field}' not found");
        }
    }
    Ok(())
}
