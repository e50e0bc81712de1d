//! Seed discovery
//!
//! Seeds are explicit `(type, directives, target)` records. They are read
//! from marker annotations on scanned input types, or from a TOML seed
//! file:
//!
//! ```toml
//! [[reflective]]
//! type = "com.example.Model"
//! including = ["ALL_SUBTYPES"]
//!
//! [[proxy]]
//! type = "com.example.Service"
//! ```

use crate::catalog::{AnnotationDesc, TypeCatalog};
use crate::closure::InclusionDirective;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Marks a type for reflective generation
pub const REFLECTIVE_MARKER: &str = "likeness.Reflective";
/// Marks an interface as a proxy target
pub const PROXY_TARGET_MARKER: &str = "likeness.ProxyTarget";
/// Marks other types (listed in `classes`) for reflective generation
pub const REFLECTIVE_INCLUDE_MARKER: &str = "likeness.Reflective$Include";
/// Marks other interfaces (listed in `classes`) as proxy targets
pub const PROXY_TARGET_INCLUDE_MARKER: &str = "likeness.ProxyTarget$Include";

/// Which kind of support a seed asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedTarget {
    /// Reflective access
    Reflective,
    /// Proxy creation
    ProxyTarget,
}

/// One seed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    /// Seed type
    pub type_name: String,
    /// Directives to expand from this seed
    pub directives: BTreeSet<InclusionDirective>,
    /// Requested support
    pub target: SeedTarget,
}

impl Seed {
    /// Create a seed
    pub fn new(
        type_name: &str,
        directives: impl IntoIterator<Item = InclusionDirective>,
        target: SeedTarget,
    ) -> Self {
        Self {
            type_name: type_name.to_owned(),
            directives: directives.into_iter().collect(),
            target,
        }
    }
}

/// Errors reading a seed file
#[derive(Debug, Error)]
pub enum SeedFileError {
    /// Failed to read the seed file
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    reflective: Vec<SeedRecord>,
    #[serde(default)]
    proxy: Vec<SeedRecord>,
}

#[derive(Debug, Deserialize)]
struct SeedRecord {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    including: Vec<InclusionDirective>,
}

/// Seeds for one run; a repeated `(type, target)` merges its directives
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    seeds: Vec<Seed>,
}

impl SeedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seed
    pub fn push(&mut self, seed: Seed) {
        match self
            .seeds
            .iter_mut()
            .find(|s| s.type_name == seed.type_name && s.target == seed.target)
        {
            Some(existing) => existing.directives.extend(seed.directives),
            None => self.seeds.push(seed),
        }
    }

    /// Add every seed of `other`
    pub fn merge(&mut self, other: SeedSet) {
        for seed in other.seeds {
            self.push(seed);
        }
    }

    /// Seeds declared by markers on the catalog's input types
    pub fn from_catalog(catalog: &dyn TypeCatalog) -> Self {
        let mut set = SeedSet::new();
        for desc in catalog.input_types() {
            for marker in desc.annotations_of(REFLECTIVE_MARKER) {
                set.push(Seed::new(&desc.name, directives(marker), SeedTarget::Reflective));
            }
            for marker in desc.annotations_of(PROXY_TARGET_MARKER) {
                set.push(Seed::new(&desc.name, directives(marker), SeedTarget::ProxyTarget));
            }
            for marker in desc.annotations_of(REFLECTIVE_INCLUDE_MARKER) {
                for class in marker.strings("classes") {
                    set.push(Seed::new(&class, directives(marker), SeedTarget::Reflective));
                }
            }
            for marker in desc.annotations_of(PROXY_TARGET_INCLUDE_MARKER) {
                for class in marker.strings("classes") {
                    set.push(Seed::new(&class, directives(marker), SeedTarget::ProxyTarget));
                }
            }
        }
        log::debug!("Found {} seeds in the catalog", set.len());
        set
    }

    /// Parse a TOML seed file
    pub fn from_toml(text: &str) -> Result<Self, SeedFileError> {
        let file: SeedFile = toml::from_str(text)?;
        let mut set = SeedSet::new();
        for record in file.reflective {
            set.push(Seed::new(&record.type_name, record.including, SeedTarget::Reflective));
        }
        for record in file.proxy {
            set.push(Seed::new(&record.type_name, record.including, SeedTarget::ProxyTarget));
        }
        Ok(set)
    }

    /// Read and parse a TOML seed file
    pub fn load_toml(path: &Path) -> Result<Self, SeedFileError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Seeds with the given target
    pub fn targeting(&self, target: SeedTarget) -> impl Iterator<Item = &Seed> {
        self.seeds.iter().filter(move |s| s.target == target)
    }

    /// All seeds
    pub fn iter(&self) -> impl Iterator<Item = &Seed> {
        self.seeds.iter()
    }

    /// Number of seeds
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Whether there are no seeds
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

fn directives(marker: &AnnotationDesc) -> BTreeSet<InclusionDirective> {
    marker
        .strings("including")
        .iter()
        .filter_map(|name| match name.parse() {
            Ok(directive) => Some(directive),
            Err(e) => {
                log::warn!("Ignoring {e} on {}", marker.type_name);
                None
            }
        })
        .collect()
}
