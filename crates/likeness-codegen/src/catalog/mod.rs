//! Type catalog
//!
//! The read-only universe of compiled type descriptors. Descriptors come
//! from the scanned input (the only types that can carry seeds) and from
//! class libraries, which fill in supertypes and signature types the
//! input refers to.

mod load;
mod model;
mod shape;

pub use load::{embedded_baseline, load_path, parse_document, BASELINE_JSON};
pub(crate) use load::is_archive;
pub use model::{
    annotation_value, AnnotationDesc, ConstructorDesc, FieldDesc, MethodDesc, ParameterDesc,
    TypeDescriptor, TypeKind, Visibility,
};
pub use shape::TypeShape;

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while reading or querying a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read a catalog file
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to parse a catalog document
    #[error("Failed to parse type catalog {}: {source}", .path.display())]
    Parse {
        /// Document being parsed
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Failed to read a catalog archive
    #[error("Failed to read archive {}: {source}", .path.display())]
    Archive {
        /// Archive being read
        path: PathBuf,
        /// Underlying error
        source: zip::result::ZipError,
    },

    /// A type exists but its description cannot be produced
    #[error("Type {name} cannot be described: {reason}")]
    Unreadable {
        /// Type name
        name: String,
        /// Why
        reason: String,
    },
}

/// Queries the closure engine and compiler make against the type universe
pub trait TypeCatalog {
    /// Descriptor for `name`, or `None` when the name is unknown
    fn describe(&self, name: &str) -> Result<Option<Arc<TypeDescriptor>>, CatalogError>;

    /// Types whose superclass or interfaces name `name` directly
    fn direct_subtypes(&self, name: &str) -> Result<Vec<String>, CatalogError>;

    /// Scanned input types, in load order
    fn input_types(&self) -> Vec<Arc<TypeDescriptor>>;
}

/// In-memory catalog with a precomputed subtype index
#[derive(Debug, Default)]
pub struct Catalog {
    types: FxHashMap<String, Arc<TypeDescriptor>>,
    input: Vec<Arc<TypeDescriptor>>,
    subtypes: FxHashMap<String, Vec<String>>,
}

impl Catalog {
    /// Start building a catalog
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Number of known types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are known
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether `name` is known
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

impl TypeCatalog for Catalog {
    fn describe(&self, name: &str) -> Result<Option<Arc<TypeDescriptor>>, CatalogError> {
        Ok(self.types.get(name).cloned())
    }

    fn direct_subtypes(&self, name: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self.subtypes.get(name).cloned().unwrap_or_default())
    }

    fn input_types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.input.clone()
    }
}

/// Builder for [`Catalog`]
///
/// Input types shadow library types of the same name; among types of the
/// same origin the first one added wins.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    input: Vec<TypeDescriptor>,
    library: Vec<TypeDescriptor>,
}

impl CatalogBuilder {
    /// Add a scanned input type
    pub fn input(mut self, desc: TypeDescriptor) -> Self {
        self.input.push(desc);
        self
    }

    /// Add scanned input types
    pub fn with_input(mut self, descs: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.input.extend(descs);
        self
    }

    /// Add a class library type
    pub fn library(mut self, desc: TypeDescriptor) -> Self {
        self.library.push(desc);
        self
    }

    /// Add class library types
    pub fn with_library(mut self, descs: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.library.extend(descs);
        self
    }

    /// Index the types
    pub fn build(self) -> Catalog {
        let mut catalog = Catalog::default();
        let mut order = Vec::new();

        for desc in self.input {
            if catalog.types.contains_key(&desc.name) {
                continue;
            }
            let desc = Arc::new(desc);
            catalog.types.insert(desc.name.clone(), Arc::clone(&desc));
            catalog.input.push(Arc::clone(&desc));
            order.push(desc);
        }
        for desc in self.library {
            if catalog.types.contains_key(&desc.name) {
                continue;
            }
            let desc = Arc::new(desc);
            catalog.types.insert(desc.name.clone(), Arc::clone(&desc));
            order.push(desc);
        }

        let mut seen: FxHashSet<(String, String)> = FxHashSet::default();
        for desc in &order {
            for supertype in desc.supertypes() {
                if seen.insert((supertype.to_owned(), desc.name.clone())) {
                    catalog
                        .subtypes
                        .entry(supertype.to_owned())
                        .or_default()
                        .push(desc.name.clone());
                }
            }
        }

        log::debug!(
            "Indexed {} types ({} from input)",
            catalog.types.len(),
            catalog.input.len()
        );
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_index() {
        let catalog = Catalog::builder()
            .input(TypeDescriptor::interface("a.Shape"))
            .input(TypeDescriptor::class("a.Circle").implements("a.Shape"))
            .input(TypeDescriptor::class("a.Square").extends("a.Base").implements("a.Shape"))
            .library(TypeDescriptor::class("a.Base"))
            .build();

        assert_eq!(
            catalog.direct_subtypes("a.Shape").unwrap(),
            vec!["a.Circle", "a.Square"]
        );
        assert_eq!(catalog.direct_subtypes("a.Base").unwrap(), vec!["a.Square"]);
        assert!(catalog.direct_subtypes("a.Circle").unwrap().is_empty());
        assert_eq!(catalog.input_types().len(), 3);
    }

    #[test]
    fn test_input_shadows_library() {
        let catalog = Catalog::builder()
            .library(TypeDescriptor::class("a.B"))
            .input(TypeDescriptor::interface("a.B"))
            .build();

        let desc = catalog.describe("a.B").unwrap().unwrap();
        assert!(desc.is_interface());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.describe("a.Missing").unwrap().is_none());
    }
}
