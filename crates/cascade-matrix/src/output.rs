//! Output sinks for setup job results.

use cascade_core::{OutputSink, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends to the file GitHub Actions names in `GITHUB_OUTPUT`.
///
/// Single-line values are written as `key=value`; multi-line values use the
/// `key<<DELIM` heredoc form with a delimiter that does not occur in the value.
pub struct GithubOutputFile {
    path: PathBuf,
}

impl GithubOutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn delimiter_for(value: &str) -> String {
    let mut delimiter = String::from("EOF");
    while value.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    delimiter
}

impl OutputSink for GithubOutputFile {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.append(&format!("{}={}\n", key, value))
    }

    fn set_multiline(&mut self, key: &str, value: &str) -> Result<()> {
        let delimiter = delimiter_for(value);
        self.append(&format!(
            "{}<<{}\n{}\n{}\n",
            key,
            delimiter,
            value.trim_end_matches('\n'),
            delimiter
        ))
    }
}

/// Collects outputs in memory.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    pub values: Vec<(String, String)>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }
}

impl OutputSink for MemoryOutput {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn set_multiline(&mut self, key: &str, value: &str) -> Result<()> {
        self.set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_github_output_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        let mut sink = GithubOutputFile::new(&path);
        sink.set("trigger_repo", "eckit").unwrap();
        sink.set_multiline("dep_tree", "eckit:\n  deps: []\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "trigger_repo=eckit\ndep_tree<<EOF\neckit:\n  deps: []\nEOF\n"
        );
    }

    #[test]
    fn test_delimiter_avoids_value_lines() {
        assert_eq!(delimiter_for("a\nEOF\nb"), "EOF_");
        assert_eq!(delimiter_for("EOF is fine inline"), "EOF");
    }

    #[test]
    fn test_memory_output_last_value_wins() {
        let mut sink = MemoryOutput::new();
        sink.set("a", "1").unwrap();
        sink.set("a", "2").unwrap();
        assert_eq!(sink.get("a"), Some("2"));
        assert_eq!(sink.keys().count(), 2);
    }
}
