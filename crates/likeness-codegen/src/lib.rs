//! Likeness build-time reflection compiler
//!
//! Reads a type catalog, computes which types need reflective support,
//! compiles each of them to indexed dispatch code plus metadata, and
//! writes the resulting code units with a name-keyed registry.
//!
//! # Example
//!
//! ```no_run
//! use likeness_codegen::{
//!     open_output, Catalog, CompileCache, Generator, OutputFormat, SeedSet,
//! };
//! use std::path::Path;
//!
//! let input = likeness_codegen::catalog::load_path(Path::new("types.json")).unwrap();
//! let catalog = Catalog::builder().with_input(input).build();
//! let seeds = SeedSet::from_catalog(&catalog);
//!
//! let generated = Generator::new(&catalog)
//!     .generate(&seeds, &mut CompileCache::new())
//!     .unwrap();
//! let target = open_output(Path::new("out.jar"), OutputFormat::Archive).unwrap();
//! generated.write_to(target).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod catalog;
pub mod classlib;
pub mod closure;
pub mod compiler;
pub mod emit;
pub mod generator;
pub mod metadata;
pub mod output;
pub mod seeds;

pub use cache::CompileCache;
pub use catalog::{Catalog, CatalogError, TypeCatalog, TypeDescriptor};
pub use classlib::{ClasslibConfig, ConfigError};
pub use closure::{ClosureEngine, ClosureSet, CollectorKind, InclusionDirective};
pub use compiler::{CompileOutcome, OperationTable, ReflectionCompiler, SkipReason};
pub use emit::{emit, DispatchCode};
pub use generator::{GenerateError, GenerateReport, Generated, Generator};
pub use output::{open_output, OutputError, OutputFormat, OutputTarget};
pub use seeds::{Seed, SeedFileError, SeedSet, SeedTarget};
