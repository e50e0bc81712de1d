//! Generation pipeline
//!
//! seeds → reflective and proxy closures → compile → emit + verify →
//! metadata blob → registry → output.

use crate::cache::CompileCache;
use crate::catalog::TypeCatalog;
use crate::closure::{should_generate, ClosureEngine, ClosureSet, CollectorKind};
use crate::compiler::{CompileOutcome, OperationTable, ReflectionCompiler, SkipReason};
use crate::emit::{self, build_registry, RegistryError};
use crate::metadata;
use crate::output::{OutputError, OutputTarget};
use crate::seeds::{SeedSet, SeedTarget};
use likeness_format::{verify_unit, CodeUnit, VerifyError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that stop a generation run
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The registry unit failed verification
    #[error("Generated unit {unit} is invalid: {source}")]
    Verify {
        /// Unit name
        unit: String,
        /// Verifier error
        source: VerifyError,
    },

    /// Registry construction failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Writing output failed
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Summary of a generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateReport {
    /// Size of the reflective closure
    pub reflective_types: usize,
    /// Size of the proxy closure
    pub proxy_types: usize,
    /// Generated types, in registry order
    pub generated: Vec<String>,
    /// Generated types the catalog could not resolve
    pub unresolved: Vec<String>,
    /// Types that failed to compile
    pub skipped: Vec<SkipReason>,
}

/// Everything a run produces, ready to be written
#[derive(Debug, Clone)]
pub struct Generated {
    /// One unit per generated type
    pub units: Vec<CodeUnit>,
    /// Registry unit, absent when nothing was generated
    pub registry: Option<CodeUnit>,
    /// Run summary
    pub report: GenerateReport,
}

impl Generated {
    /// Write every unit, the registry and the service entry
    pub fn write_to(&self, mut target: Box<dyn OutputTarget>) -> Result<(), GenerateError> {
        for unit in &self.units {
            target.write_unit(unit)?;
        }
        if let Some(registry) = &self.registry {
            target.write_unit(registry)?;
            target.write_service_entry()?;
        }
        target.finish()?;
        Ok(())
    }
}

/// Runs the pipeline over one catalog
pub struct Generator<'a> {
    catalog: &'a dyn TypeCatalog,
}

impl<'a> Generator<'a> {
    /// Generator over `catalog`
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Closures for `seeds`: (reflective, proxy)
    pub fn closures(&self, seeds: &SeedSet, cache: &mut CompileCache) -> (ClosureSet, ClosureSet) {
        let reflective = ClosureEngine::new(self.catalog, CollectorKind::Reflective)
            .compute(seeds.targeting(SeedTarget::Reflective), cache);
        let proxy = ClosureEngine::new(self.catalog, CollectorKind::Proxy)
            .compute(seeds.targeting(SeedTarget::ProxyTarget), cache);
        (reflective, proxy)
    }

    /// Compile and emit every type reachable from `seeds`
    pub fn generate(
        &self,
        seeds: &SeedSet,
        cache: &mut CompileCache,
    ) -> Result<Generated, GenerateError> {
        let (reflective, proxy) = self.closures(seeds, cache);
        let mut report = GenerateReport {
            reflective_types: reflective.len(),
            proxy_types: proxy.len(),
            ..GenerateReport::default()
        };

        let mut names: Vec<&str> = proxy.names().collect();
        names.extend(reflective.names().filter(|name| !proxy.contains(name)));
        names.retain(|name| should_generate(name));

        let compiler = ReflectionCompiler::new(self.catalog);
        let mut tables: Vec<Arc<OperationTable>> = Vec::new();
        for name in names {
            match compiler.compile(name, cache) {
                CompileOutcome::Compiled(table) => tables.push(table),
                CompileOutcome::Skipped(reason) => report.skipped.push(reason),
            }
        }

        let mut units = Vec::with_capacity(tables.len());
        tables.retain(|table| {
            let code = emit::emit(table);
            if let Err(e) = verify_unit(&code.unit) {
                log::warn!("Skipping {}: generated unit is invalid: {e}", table.type_name);
                report.skipped.push(SkipReason {
                    type_name: table.type_name.clone(),
                    reason: format!("generated unit is invalid: {e}"),
                });
                return false;
            }
            if table.is_unresolved() {
                report.unresolved.push(table.type_name.clone());
            }
            report.generated.push(table.type_name.clone());
            units.push(code.unit);
            true
        });

        let registry = if units.is_empty() {
            None
        } else {
            let blob = metadata::serialize_tables(tables.iter().map(|t| t.as_ref()));
            let registry = build_registry(&mut units, blob)?;
            verify_unit(&registry).map_err(|source| GenerateError::Verify {
                unit: registry.name.clone(),
                source,
            })?;
            Some(registry)
        };

        log::info!(
            "Generated {} types ({} skipped, {} unresolved)",
            report.generated.len(),
            report.skipped.len(),
            report.unresolved.len()
        );
        Ok(Generated {
            units,
            registry,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AnnotationDesc, Catalog, ConstructorDesc, MethodDesc, TypeDescriptor};
    use likeness_format::RoutineKind;
    use crate::seeds::{PROXY_TARGET_MARKER, REFLECTIVE_MARKER};
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::builder()
            .input(
                TypeDescriptor::class("app.Model")
                    .annotated(
                        AnnotationDesc::new(REFLECTIVE_MARKER)
                            .with_value("including", json!(["DIRECT_SUPERTYPES"])),
                    )
                    .extends("app.Base")
                    .with_constructor(ConstructorDesc::public(&[])),
            )
            .input(TypeDescriptor::class("app.Base"))
            .input(
                TypeDescriptor::interface("app.Listener")
                    .annotated(AnnotationDesc::new(PROXY_TARGET_MARKER))
                    .annotated(AnnotationDesc::new(REFLECTIVE_MARKER))
                    .with_method(MethodDesc::public("changed", &["app.Model"], "void")),
            )
            .build()
    }

    #[test]
    fn test_generate_orders_proxies_first() {
        let catalog = catalog();
        let seeds = SeedSet::from_catalog(&catalog);
        let generated = Generator::new(&catalog)
            .generate(&seeds, &mut CompileCache::new())
            .unwrap();

        assert_eq!(
            generated.report.generated,
            vec!["app.Listener", "app.Base", "app.Model"]
        );
        assert_eq!(generated.report.reflective_types, 3);
        assert_eq!(generated.report.proxy_types, 1);
        assert!(generated.report.skipped.is_empty());

        let registry = generated.registry.as_ref().unwrap();
        assert_eq!(registry.links.len(), 3);
        assert_eq!(generated.units[2].entry_index, Some(2));

        let entries = likeness_format::meta::deserialize(registry.metadata.as_ref().unwrap()).unwrap();
        assert_eq!(entries[0].name, "app.Listener");
        assert_eq!(entries[0].proxy_methods.len(), 4);
    }

    #[test]
    fn test_no_seeds_no_registry() {
        let catalog = Catalog::builder().input(TypeDescriptor::class("a.B")).build();
        let generated = Generator::new(&catalog)
            .generate(&SeedSet::new(), &mut CompileCache::new())
            .unwrap();
        assert!(generated.units.is_empty());
        assert!(generated.registry.is_none());
    }

    #[test]
    fn test_unresolved_and_unpackaged_types() {
        let catalog = Catalog::builder()
            .input(
                TypeDescriptor::class("a.B")
                    .extends("ext.Missing")
                    .implements("Local")
                    .annotated(
                        AnnotationDesc::new(REFLECTIVE_MARKER)
                            .with_value("including", json!(["ALL_SUPERTYPES"])),
                    ),
            )
            .build();
        let generated = Generator::new(&catalog)
            .generate(&SeedSet::from_catalog(&catalog), &mut CompileCache::new())
            .unwrap();
        assert_eq!(generated.report.generated, vec!["a.B", "ext.Missing"]);
        assert_eq!(generated.report.unresolved, vec!["ext.Missing"]);
    }

    #[test]
    fn test_constructor_metadata_matches_dispatch_cases() {
        let reflective = || AnnotationDesc::new(REFLECTIVE_MARKER);
        let catalog = Catalog::builder()
            .input(
                TypeDescriptor::class("a.Plain")
                    .annotated(reflective())
                    .with_constructor(ConstructorDesc::public(&[]))
                    .with_constructor(ConstructorDesc::public(&["int"])),
            )
            .input(
                TypeDescriptor::class("a.Shape")
                    .into_abstract()
                    .annotated(reflective())
                    .with_constructor(ConstructorDesc::public(&[])),
            )
            .input(
                TypeDescriptor::enumeration("a.Color", &["RED"])
                    .annotated(reflective())
                    .with_constructor(ConstructorDesc::public(&[])),
            )
            .build();
        let generated = Generator::new(&catalog)
            .generate(&SeedSet::from_catalog(&catalog), &mut CompileCache::new())
            .unwrap();
        let registry = generated.registry.as_ref().unwrap();
        let entries = likeness_format::meta::deserialize(registry.metadata.as_ref().unwrap()).unwrap();

        let mut counts = Vec::new();
        for unit in &generated.units {
            let entry = &entries[unit.entry_index.unwrap() as usize];
            let cases = unit
                .routine(RoutineKind::Construct)
                .map_or(0, |routine| routine.case_count());
            assert_eq!(entry.constructors.len(), cases, "{}", entry.name);
            counts.push((entry.name.as_str(), cases));
        }
        counts.sort();
        assert_eq!(counts, vec![("a.Color", 1), ("a.Plain", 2), ("a.Shape", 0)]);
    }

    #[test]
    fn test_invalid_unit_is_skipped() {
        let params = vec!["int"; u16::MAX as usize + 1];
        let catalog = Catalog::builder()
            .input(
                TypeDescriptor::class("a.Wide")
                    .annotated(AnnotationDesc::new(REFLECTIVE_MARKER))
                    .with_constructor(ConstructorDesc::public(&params)),
            )
            .input(
                TypeDescriptor::class("a.Narrow")
                    .annotated(AnnotationDesc::new(REFLECTIVE_MARKER))
                    .with_constructor(ConstructorDesc::public(&["int"])),
            )
            .build();
        let generated = Generator::new(&catalog)
            .generate(&SeedSet::from_catalog(&catalog), &mut CompileCache::new())
            .unwrap();

        assert_eq!(generated.report.generated, vec!["a.Narrow"]);
        assert_eq!(generated.report.skipped.len(), 1);
        assert_eq!(generated.report.skipped[0].type_name, "a.Wide");
        assert!(generated.report.skipped[0].reason.contains("arity"));

        let registry = generated.registry.as_ref().unwrap();
        assert_eq!(registry.links, vec![generated.units[0].name.clone()]);
        let entries = likeness_format::meta::deserialize(registry.metadata.as_ref().unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.Narrow");
    }
}
