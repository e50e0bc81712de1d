//! Output assembly
//!
//! Writes code units and the provider service entry into a directory tree
//! or a zip archive. Entries are written in the order they are produced;
//! nothing is rolled back when a write fails.

use likeness_format::names::{service_entry_path, unit_path, REGISTRY_UNIT};
use likeness_format::CodeUnit;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors writing generated output
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem error
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Archive error
    #[error("Failed to write archive {}: {source}", .path.display())]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: zip::result::ZipError,
    },

    /// Unknown format name
    #[error("Unknown output format '{0}' (expected jar or folder)")]
    UnknownFormat(String),
}

/// Physical output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Zip archive
    Archive,
    /// Directory tree
    Directory,
}

impl OutputFormat {
    /// Archive for `.jar`/`.zip` paths, directory otherwise
    pub fn infer(path: &Path) -> Self {
        if crate::catalog::is_archive(path) {
            OutputFormat::Archive
        } else {
            OutputFormat::Directory
        }
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jar" | "zip" | "archive" => Ok(OutputFormat::Archive),
            "folder" | "dir" | "directory" => Ok(OutputFormat::Directory),
            _ => Err(OutputError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Destination of generated entries
pub trait OutputTarget {
    /// Write a raw entry at a `/`-separated relative path
    fn write_entry(&mut self, relative: &str, contents: &[u8]) -> Result<(), OutputError>;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<(), OutputError>;

    /// Write an encoded code unit at its unit path
    fn write_unit(&mut self, unit: &CodeUnit) -> Result<(), OutputError> {
        self.write_entry(&unit_path(&unit.name), &unit.encode())
    }

    /// Write the provider service entry naming the registry unit
    fn write_service_entry(&mut self) -> Result<(), OutputError> {
        self.write_entry(&service_entry_path(), format!("{REGISTRY_UNIT}\n").as_bytes())
    }
}

/// Open `path` for writing in `format`
pub fn open_output(path: &Path, format: OutputFormat) -> Result<Box<dyn OutputTarget>, OutputError> {
    match format {
        OutputFormat::Directory => Ok(Box::new(DirectoryOutput::create(path)?)),
        OutputFormat::Archive => Ok(Box::new(ArchiveOutput::create(path)?)),
    }
}

/// Writes entries as files under a root directory
#[derive(Debug)]
pub struct DirectoryOutput {
    root: PathBuf,
}

impl DirectoryOutput {
    /// Create the root directory if needed
    pub fn create(root: &Path) -> Result<Self, OutputError> {
        fs::create_dir_all(root).map_err(|source| OutputError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

impl OutputTarget for DirectoryOutput {
    fn write_entry(&mut self, relative: &str, contents: &[u8]) -> Result<(), OutputError> {
        let path = relative.split('/').fold(self.root.clone(), |p, part| p.join(part));
        let io_error = |source| OutputError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&path, contents).map_err(io_error)
    }

    fn finish(self: Box<Self>) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Writes entries into a deflated zip archive
pub struct ArchiveOutput {
    path: PathBuf,
    writer: ZipWriter<fs::File>,
    options: SimpleFileOptions,
}

impl ArchiveOutput {
    /// Create (or truncate) the archive
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| OutputError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = fs::File::create(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        })
    }
}

impl OutputTarget for ArchiveOutput {
    fn write_entry(&mut self, relative: &str, contents: &[u8]) -> Result<(), OutputError> {
        self.writer
            .start_file(relative, self.options)
            .map_err(|source| OutputError::Archive {
                path: self.path.clone(),
                source,
            })?;
        self.writer
            .write_all(contents)
            .map_err(|source| OutputError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(self: Box<Self>) -> Result<(), OutputError> {
        let ArchiveOutput { path, writer, .. } = *self;
        match writer.finish() {
            Ok(_) => {
                log::debug!("Wrote archive {}", path.display());
                Ok(())
            }
            Err(source) => Err(OutputError::Archive { path, source }),
        }
    }
}
