use super::{ensure_filedir, plain_path};
use crate::logging::Report;
use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::io::{Read, Write};
use std::mem;
use std::path::Path;

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Serialize an object with bincode; `.gz` paths are gzip-compressed
pub fn dump_object<T: Serialize>(filepath: impl AsRef<Path>, obj: &T, report: &dyn Report) -> Result<()> {
    let path = ensure_filedir(filepath)?;
    report.report(&format!("Dump data into {} ...", path.display()));

    let encoded = bincode::serialize(obj).context("Failed to encode object")?;
    write_bytes(&path, &encoded)
}

/// A field value lent out of an object while it is being dumped
pub type Detached = Box<dyn Any>;

/// Objects that can lend named fields out and take them back
///
/// Nested fields use dotted names (`inner.buffer`); the outer type forwards
/// the rest of the path to the inner one. Return `None` for unknown names.
pub trait Detach {
    fn detach(&mut self, field: &str) -> Option<Detached>;
    fn reattach(&mut self, field: &str, value: Detached);
}

/// Move a field out, leaving its default behind
pub fn take_field<F: Default + 'static>(slot: &mut F) -> Detached {
    Box::new(mem::take(slot))
}

/// Put back a value produced by [`take_field`]
pub fn restore_field<F: 'static>(slot: &mut F, value: Detached) {
    match value.downcast::<F>() {
        Ok(value) => *slot = *value,
        Err(_) => tracing::warn!(
            expected = std::any::type_name::<F>(),
            "detached value has another type; field keeps its default"
        ),
    }
}

/// Holds detached fields and puts them back, newest first, when dropped
struct DetachGuard<'a, 'f, T: Detach> {
    obj: &'a mut T,
    held: Vec<(&'f str, Detached)>,
}

impl<T: Detach> Drop for DetachGuard<'_, '_, T> {
    fn drop(&mut self) {
        while let Some((field, value)) = self.held.pop() {
            self.obj.reattach(field, value);
        }
    }
}

/// Like [`dump_object`], but the `exclude` fields are written as their defaults
///
/// The fields are detached only while the object is encoded, and are back in
/// place when this returns, whether it succeeds or not.
pub fn dump_object_excluding<'f, T>(
    filepath: impl AsRef<Path>,
    obj: &mut T,
    exclude: &[&'f str],
    report: &dyn Report,
) -> Result<()>
where
    T: Serialize + Detach,
{
    let mut guard = DetachGuard {
        obj,
        held: Vec::with_capacity(exclude.len()),
    };
    for &field in exclude {
        match guard.obj.detach(field) {
            Some(value) => guard.held.push((field, value)),
            None => bail!("Excluded field '{field}' not found"),
        }
    }

    dump_object(filepath, &*guard.obj, report)
}

/// Load an object written by [`dump_object`]
pub fn load_object<T: DeserializeOwned>(filepath: impl AsRef<Path>, report: &dyn Report) -> Result<T> {
    let path = plain_path(filepath)?;
    report.report(&format!("Load data from {} ...", path.display()));

    let raw =
        std::fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let bytes = if is_gzip(&path) {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .with_context(|| format!("Failed to decompress: {}", path.display()))?;
        decoded
    } else {
        raw
    };

    bincode::deserialize(&bytes).with_context(|| format!("Failed to decode object: {}", path.display()))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let data = if is_gzip(path) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()?
    } else {
        bytes.to_vec()
    };

    std::fs::write(path, data).with_context(|| format!("Failed to write file: {}", path.display()))
}
