use super::{ensure_filedir, plain_path};
use crate::logging::Report;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Lazy line iterator returned by [`read_lines`]
pub struct Lines {
    path: PathBuf,
    inner: std::io::Lines<BufReader<File>>,
}

impl Iterator for Lines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.inner.next()?;
        Some(
            line.map(|line| line.trim_end().to_string())
                .with_context(|| format!("Failed to read line from {}", self.path.display())),
        )
    }
}

/// Read a UTF-8 text file line by line, stripping trailing whitespace
pub fn read_lines(filepath: impl AsRef<Path>, report: &dyn Report) -> Result<Lines> {
    let path = plain_path(filepath)?;
    report.report(&format!("Read lines from {} ...", path.display()));

    let file =
        File::open(&path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    Ok(Lines {
        inner: BufReader::new(file).lines(),
        path,
    })
}

/// Write lines into a text file, one per line, creating parent directories
pub fn write_lines<S: AsRef<str>>(
    filepath: impl AsRef<Path>,
    lines: &[S],
    report: &dyn Report,
) -> Result<()> {
    let path = ensure_filedir(filepath)?;
    report.report(&format!("Write {} lines into {} ...", lines.len(), path.display()));

    let file =
        File::create(&path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line.as_ref())?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Count lines; a final line without a newline still counts
pub fn count_lines(filepath: impl AsRef<Path>) -> Result<usize> {
    let path = plain_path(filepath)?;
    let file =
        File::open(&path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut count = 0;
    for segment in BufReader::new(file).split(b'\n') {
        segment.with_context(|| format!("Failed to read file: {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{MemoryReport, SilentReport};
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/lines.txt");
        let report = MemoryReport::new();

        write_lines(&path, &["alpha  ", "beta", ""], &report).unwrap();
        let lines: Vec<String> = read_lines(&path, &report)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(lines, vec!["alpha", "beta", ""]);
        let messages = report.messages();
        assert!(messages[0].starts_with("Write 3 lines into"));
        assert!(messages[1].starts_with("Read lines from"));
    }

    #[test]
    fn test_count_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("count.txt");

        std::fs::write(&path, "a\nb\nc\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 3);

        std::fs::write(&path, "a\nb\nc").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 3);

        std::fs::write(&path, "").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 0);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_lines("/definitely/not/here.txt", &SilentReport);
        assert!(result.is_err());
    }
}
