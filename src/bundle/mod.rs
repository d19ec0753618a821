//! Source archiving
//!
//! Packages the job's source directory into a single zip archive that the
//! cluster downloads and extracts before running the entry point. Only files
//! matching the include patterns are archived (Python sources by default).
//! Entries are written in sorted order with a fixed timestamp so the same
//! sources always produce the same archive digest.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name of the archive, locally and in object storage.
pub const ARCHIVE_NAME: &str = "spark_zip.zip";

/// Default include pattern.
pub const DEFAULT_INCLUDE: &str = "*.py";

/// Errors for archiving operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid include pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("No files matching {patterns:?} under {root}")]
    NothingToArchive { root: PathBuf, patterns: Vec<String> },

    #[error("Entry point '{0}' is not among the archived files")]
    EntryPointMissing(String),
}

/// A zip archive written to local disk.
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    /// Where the archive was written
    pub path: PathBuf,
    /// Archived paths relative to the source root, in archive order
    pub entries: Vec<String>,
    /// Archive size in bytes
    pub size: u64,
    /// SHA-256 hex digest of the archive bytes
    pub sha256: String,
}

impl ArchiveArtifact {
    /// Check whether a relative path was archived.
    pub fn contains(&self, rel_path: &str) -> bool {
        self.entries.iter().any(|e| e == rel_path)
    }
}

/// Builds the source archive for a submission.
pub struct Archiver {
    root: PathBuf,
    patterns: Vec<String>,
}

impl Archiver {
    /// Create an archiver for `root` with the default `*.py` filter.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: vec![DEFAULT_INCLUDE.to_string()],
        }
    }

    /// Replace the include patterns.
    ///
    /// A `*` also matches path separators, so `*.py` selects nested modules.
    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    fn matcher(&self) -> Result<GlobSet, ArchiveError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            let glob = Glob::new(pattern).map_err(|source| ArchiveError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ArchiveError::Pattern {
            pattern: self.patterns.join(","),
            source,
        })
    }

    /// Collect matching files as (relative zip name, absolute path).
    /// Symlinks are followed and stored as the content they point at.
    fn collect_files(&self) -> Result<Vec<(String, PathBuf)>, ArchiveError> {
        if !self.root.is_dir() {
            return Err(ArchiveError::SourceNotFound(self.root.clone()));
        }

        let matcher = self.matcher()?;
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = match entry.path().strip_prefix(&self.root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let name = zip_name(rel_path);
            if matcher.is_match(&name) {
                files.push((name, entry.path().to_path_buf()));
            }
        }

        Ok(files)
    }

    /// Write the archive to `dest`, replacing any archive left there by an
    /// earlier submission.
    pub fn create_archive(&self, dest: &Path) -> Result<ArchiveArtifact, ArchiveError> {
        let files = self.collect_files()?;
        if files.is_empty() {
            return Err(ArchiveError::NothingToArchive {
                root: self.root.clone(),
                patterns: self.patterns.clone(),
            });
        }

        match fs::remove_file(dest) {
            Ok(()) => debug!(path = %dest.display(), "removed previous archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut writer = ZipWriter::new(File::create(dest)?);
        let mut entries = Vec::with_capacity(files.len());
        for (name, path) in files {
            let contents = fs::read(&path)?;
            writer.start_file(name.as_str(), options)?;
            writer.write_all(&contents)?;
            entries.push(name);
        }
        writer.finish()?;

        let bytes = fs::read(dest)?;
        let sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            hex::encode(hasher.finalize())
        };

        info!(
            root = %self.root.display(),
            archive = %dest.display(),
            files = entries.len(),
            bytes = bytes.len(),
            "archived sources"
        );

        Ok(ArchiveArtifact {
            path: dest.to_path_buf(),
            entries,
            size: bytes.len() as u64,
            sha256,
        })
    }
}

/// Zip entry name for a relative path, always `/`-separated.
fn zip_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "print('hi')").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("pkg/__init__.py"), "").unwrap();
        fs::write(dir.path().join("pkg/sub/util.py"), "X = 1").unwrap();
        fs::write(dir.path().join("pkg/data.csv"), "a,b").unwrap();
        dir
    }

    fn read_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_only_python_files_are_archived() {
        let dir = create_test_dir();
        let out = TempDir::new().unwrap();
        let dest = out.path().join(ARCHIVE_NAME);

        let artifact = Archiver::new(dir.path()).create_archive(&dest).unwrap();

        assert_eq!(
            artifact.entries,
            vec!["main.py", "pkg/__init__.py", "pkg/sub/util.py"]
        );
        assert_eq!(read_names(&dest), vec!["main.py", "pkg/__init__.py", "pkg/sub/util.py"]);
        assert!(artifact.contains("main.py"));
        assert!(!artifact.contains("README.md"));
        assert_eq!(artifact.sha256.len(), 64);
        assert_eq!(artifact.size, fs::metadata(&dest).unwrap().len());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_sources_are_archived() {
        use std::os::unix::fs::symlink;

        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("shared_util.py"), "Y = 2").unwrap();
        fs::create_dir_all(shared.path().join("libpkg")).unwrap();
        fs::write(shared.path().join("libpkg/__init__.py"), "").unwrap();

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "import shared_util").unwrap();
        symlink(shared.path().join("shared_util.py"), dir.path().join("shared_util.py")).unwrap();
        symlink(shared.path().join("libpkg"), dir.path().join("libpkg")).unwrap();

        let out = TempDir::new().unwrap();
        let dest = out.path().join(ARCHIVE_NAME);
        let artifact = Archiver::new(dir.path()).create_archive(&dest).unwrap();

        assert_eq!(
            artifact.entries,
            vec!["libpkg/__init__.py", "main.py", "shared_util.py"]
        );

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut body = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("shared_util.py").unwrap(), &mut body).unwrap();
        assert_eq!(body, "Y = 2");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_an_error() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        symlink(dir.path(), dir.path().join("pkg/back")).unwrap();

        let out = TempDir::new().unwrap();
        let result = Archiver::new(dir.path()).create_archive(&out.path().join(ARCHIVE_NAME));
        assert!(matches!(result, Err(ArchiveError::Walk(_))));
    }

    #[test]
    fn test_prior_archive_is_overwritten() {
        let dir = create_test_dir();
        let out = TempDir::new().unwrap();
        let dest = out.path().join(ARCHIVE_NAME);
        fs::write(&dest, "stale garbage, not a zip").unwrap();

        Archiver::new(dir.path()).create_archive(&dest).unwrap();

        assert_eq!(read_names(&dest).len(), 3);
    }

    #[test]
    fn test_archive_is_deterministic() {
        let dir = create_test_dir();
        let out = TempDir::new().unwrap();

        let a = Archiver::new(dir.path())
            .create_archive(&out.path().join("a.zip"))
            .unwrap();
        let b = Archiver::new(dir.path())
            .create_archive(&out.path().join("b.zip"))
            .unwrap();

        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn test_custom_include_patterns() {
        let dir = create_test_dir();
        let out = TempDir::new().unwrap();

        let artifact = Archiver::new(dir.path())
            .with_include(["*.py", "*.csv"])
            .create_archive(&out.path().join(ARCHIVE_NAME))
            .unwrap();

        assert!(artifact.contains("pkg/data.csv"));
        assert!(artifact.contains("main.py"));
    }

    #[test]
    fn test_missing_source_dir() {
        let out = TempDir::new().unwrap();
        let result = Archiver::new(out.path().join("nope"))
            .create_archive(&out.path().join(ARCHIVE_NAME));
        assert!(matches!(result, Err(ArchiveError::SourceNotFound(_))));
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let out = TempDir::new().unwrap();

        let result = Archiver::new(dir.path()).create_archive(&out.path().join(ARCHIVE_NAME));
        assert!(matches!(result, Err(ArchiveError::NothingToArchive { .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = create_test_dir();
        let out = TempDir::new().unwrap();

        let result = Archiver::new(dir.path())
            .with_include(["a[b"])
            .create_archive(&out.path().join(ARCHIVE_NAME));
        assert!(matches!(result, Err(ArchiveError::Pattern { .. })));
    }
}
