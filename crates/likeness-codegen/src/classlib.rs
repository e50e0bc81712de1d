//! Class library configuration
//!
//! Class libraries supply descriptors for types the scanned input refers to
//! but does not declare. They are validated up front, before any
//! compilation starts.

use crate::catalog::{embedded_baseline, load_path, CatalogError, TypeDescriptor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Relative path of the type catalog inside a runtime home
pub const RUNTIME_CATALOG: &str = "lib/catalog.json";

/// Configuration errors, raised before compilation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A `--classlib-jar` path is not a file
    #[error("Class library archive {} is not a file", .0.display())]
    NotAFile(PathBuf),

    /// A `--classlib-dir` path is not a directory
    #[error("Class library directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A `--classlib-jre` path does not look like a runtime home
    #[error("{} is not a runtime home (no release file or lib/modules)", .0.display())]
    NotARuntimeHome(PathBuf),

    /// A runtime home carries no type catalog
    #[error("Runtime home {} has no {RUNTIME_CATALOG}", .0.display())]
    MissingRuntimeCatalog(PathBuf),

    /// The embedded library failed to parse
    #[error("Embedded class library is corrupt: {0}")]
    EmbeddedClasslib(#[source] CatalogError),

    /// A library failed to load
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Where class library descriptors come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClasslibConfig {
    /// Catalog archives
    pub jars: Vec<PathBuf>,
    /// Catalog directories
    pub dirs: Vec<PathBuf>,
    /// Runtime homes carrying `lib/catalog.json`
    pub runtime_homes: Vec<PathBuf>,
    /// Include the embedded baseline library
    pub embedded: bool,
}

impl ClasslibConfig {
    /// Whether no source was configured
    pub fn is_empty(&self) -> bool {
        self.jars.is_empty() && self.dirs.is_empty() && self.runtime_homes.is_empty() && !self.embedded
    }

    /// Check every configured path without loading anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        for jar in &self.jars {
            if !jar.is_file() {
                return Err(ConfigError::NotAFile(jar.clone()));
            }
        }
        for dir in &self.dirs {
            if !dir.is_dir() {
                return Err(ConfigError::NotADirectory(dir.clone()));
            }
        }
        for home in &self.runtime_homes {
            runtime_catalog(home)?;
        }
        Ok(())
    }

    /// Load every configured library, in option order
    ///
    /// Without any configured source the embedded baseline is used.
    pub fn resolve(&self) -> Result<Vec<TypeDescriptor>, ConfigError> {
        self.validate()?;

        let mut types = Vec::new();
        for jar in &self.jars {
            types.extend(load_path(jar)?);
        }
        for dir in &self.dirs {
            types.extend(load_path(dir)?);
        }
        for home in &self.runtime_homes {
            types.extend(load_path(&runtime_catalog(home)?)?);
        }
        if self.embedded || self.is_empty() {
            types.extend(embedded_baseline().map_err(ConfigError::EmbeddedClasslib)?);
        }
        log::info!("Class library provides {} types", types.len());
        Ok(types)
    }
}

fn runtime_catalog(home: &Path) -> Result<PathBuf, ConfigError> {
    let looks_like_home = home.join("release").is_file() || home.join("lib/modules").exists();
    if !home.is_dir() || !looks_like_home {
        return Err(ConfigError::NotARuntimeHome(home.to_path_buf()));
    }
    let catalog = home.join(RUNTIME_CATALOG);
    if !catalog.is_file() {
        return Err(ConfigError::MissingRuntimeCatalog(home.to_path_buf()));
    }
    Ok(catalog)
}
