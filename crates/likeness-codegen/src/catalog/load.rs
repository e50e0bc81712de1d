//! Loading catalog documents from files, directories and archives

use super::model::TypeDescriptor;
use super::CatalogError;
use serde::Deserialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Baseline class library compiled into the binary
pub const BASELINE_JSON: &str = include_str!("../../classlib/baseline.json");

/// A catalog document: `{"types": [...]}`, a bare list, or one descriptor
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Wrapped { types: Vec<TypeDescriptor> },
    List(Vec<TypeDescriptor>),
    Single(Box<TypeDescriptor>),
}

impl CatalogDocument {
    fn into_types(self) -> Vec<TypeDescriptor> {
        match self {
            CatalogDocument::Wrapped { types } | CatalogDocument::List(types) => types,
            CatalogDocument::Single(desc) => vec![*desc],
        }
    }
}

/// Parse one JSON document; `origin` is only used in errors
pub fn parse_document(text: &str, origin: &Path) -> Result<Vec<TypeDescriptor>, CatalogError> {
    serde_json::from_str::<CatalogDocument>(text)
        .map(CatalogDocument::into_types)
        .map_err(|source| CatalogError::Parse {
            path: origin.to_path_buf(),
            source,
        })
}

/// Parse the embedded baseline library
pub fn embedded_baseline() -> Result<Vec<TypeDescriptor>, CatalogError> {
    parse_document(BASELINE_JSON, Path::new("<embedded baseline>"))
}

/// Load every descriptor under `path`
///
/// A directory is searched recursively for `.json` documents (in sorted
/// order), a `.jar`/`.zip` file is read as an archive of documents, and
/// any other file is parsed as a single document.
pub fn load_path(path: &Path) -> Result<Vec<TypeDescriptor>, CatalogError> {
    if path.is_dir() {
        let mut types = Vec::new();
        for file in json_files(path)? {
            types.extend(load_file(&file)?);
        }
        log::debug!("Loaded {} types from {}", types.len(), path.display());
        Ok(types)
    } else if is_archive(path) {
        load_archive(path)
    } else {
        load_file(path)
    }
}

pub(crate) fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jar") | Some("zip")
    )
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError + '_ {
    move |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn load_file(path: &Path) -> Result<Vec<TypeDescriptor>, CatalogError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    parse_document(&text, path)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).map_err(io_error(&current))? {
            let path = entry.map_err(io_error(&current))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn load_archive(path: &Path) -> Result<Vec<TypeDescriptor>, CatalogError> {
    let archive_error = |source| CatalogError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(io_error(path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(archive_error)?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.ends_with(".json"))
        .map(str::to_owned)
        .collect();
    names.sort();

    let mut types = Vec::new();
    for name in names {
        let mut entry = archive.by_name(&name).map_err(archive_error)?;
        let mut text = String::new();
        entry.read_to_string(&mut text).map_err(io_error(path))?;
        types.extend(parse_document(&text, &path.join(&name))?);
    }
    log::debug!("Loaded {} types from archive {}", types.len(), path.display());
    Ok(types)
}
