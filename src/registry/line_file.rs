//! Line-oriented registry file
//!
//! Appends go straight to the file; rewrites go to a sibling temp file that
//! is renamed over the original so readers never see a partial registry.

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One newline-delimited registry file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFile {
    path: PathBuf,
}

impl LineFile {
    /// Wrap a path; nothing is touched on disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create parent directories and an empty file if missing
    ///
    /// Returns true when the file was created by this call.
    pub fn ensure(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                debug!("Created registry file {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one line, creating the file if needed
    pub fn append(&self, line: &str) -> Result<()> {
        self.ensure()?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.sync_data()?;

        debug!("Appended to {:?}: {}", self.path, line);
        Ok(())
    }

    /// Read all non-blank lines; a missing file reads as empty
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Replace the file contents atomically
    pub fn rewrite<S: AsRef<str>>(&self, lines: &[S]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            for line in lines {
                writeln!(file, "{}", line.as_ref())?;
            }
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            warn!("Failed to replace {:?}: {}", self.path, e);
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("Rewrote {:?} with {} lines", self.path, lines.len());
        Ok(())
    }

    /// Drop every line matching the predicate, returning how many went
    pub fn remove_where<F>(&self, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&str) -> bool,
    {
        let lines = self.read_lines()?;
        let before = lines.len();
        let kept: Vec<String> = lines.into_iter().filter(|l| !predicate(l)).collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.rewrite(&kept)?;
        }
        Ok(removed)
    }

    /// Delete the file; returns false if it did not exist
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn line_file(dir: &TempDir) -> LineFile {
        LineFile::new(dir.path().join("state").join("registry.txt"))
    }

    #[test]
    fn test_ensure_creates_parents() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);

        assert!(!file.exists());
        assert!(file.ensure().unwrap());
        assert!(file.exists());
        assert!(!file.ensure().unwrap());
    }

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);

        file.append("100 20 tenantA").unwrap();
        file.append("200 30 tenantB").unwrap();

        assert_eq!(
            file.read_lines().unwrap(),
            vec!["100 20 tenantA".to_string(), "200 30 tenantB".to_string()]
        );
    }

    #[test]
    fn test_read_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(line_file(&dir).read_lines().unwrap().is_empty());
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);
        file.ensure().unwrap();
        fs::write(file.path(), "a\n\n   \nb\n").unwrap();

        assert_eq!(file.read_lines().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_rewrite_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);
        file.append("old").unwrap();

        file.rewrite(&["new1", "new2"]).unwrap();

        assert_eq!(file.read_lines().unwrap(), vec!["new1", "new2"]);
        assert!(!file.tmp_path().exists());
    }

    #[test]
    fn test_remove_where() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);
        for line in ["keep 1", "drop 2", "keep 3", "drop 4"] {
            file.append(line).unwrap();
        }

        let removed = file.remove_where(|l| l.starts_with("drop")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(file.read_lines().unwrap(), vec!["keep 1", "keep 3"]);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let file = line_file(&dir);
        file.ensure().unwrap();

        assert!(file.remove().unwrap());
        assert!(!file.remove().unwrap());
    }
}
