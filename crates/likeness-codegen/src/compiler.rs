//! Reflection compiler
//!
//! Turns a type descriptor into an [`OperationTable`]: the ordered lists of
//! constructors, methods, fields and proxy methods that dispatch code is
//! generated for. Indices into these lists are the dispatch indices.

use crate::cache::CompileCache;
use crate::catalog::{
    ConstructorDesc, FieldDesc, MethodDesc, TypeCatalog, TypeDescriptor, Visibility,
};
use likeness_format::names::OBJECT;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// A method forwarded by a proxy, with the interface that declares it
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyMethod {
    /// Declaring interface
    pub declaring_type: String,
    /// Method declaration
    pub method: MethodDesc,
}

/// Ordered, indexed operations for one type
#[derive(Debug, Clone, PartialEq)]
pub struct OperationTable {
    /// Compiled type
    pub type_name: String,
    /// Descriptor, absent for unresolved types
    pub descriptor: Option<Arc<TypeDescriptor>>,
    /// Public constructors in declaration order
    pub constructors: Vec<ConstructorDesc>,
    /// Public declared methods in declaration order
    pub methods: Vec<MethodDesc>,
    /// Public declared fields in declaration order
    pub fields: Vec<FieldDesc>,
    /// Proxy methods (interfaces only)
    pub proxy_methods: Vec<ProxyMethod>,
}

impl OperationTable {
    /// Empty table for a type the catalog cannot resolve
    pub fn unresolved(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            descriptor: None,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            proxy_methods: Vec::new(),
        }
    }

    /// Whether the type could not be resolved
    pub fn is_unresolved(&self) -> bool {
        self.descriptor.is_none()
    }

    /// Whether the type is an interface
    pub fn is_interface(&self) -> bool {
        self.descriptor.as_deref().is_some_and(TypeDescriptor::is_interface)
    }

    /// Whether instances can be created through constructors
    pub fn is_instantiable(&self) -> bool {
        self.descriptor.as_deref().is_some_and(TypeDescriptor::is_instantiable)
    }
}

/// Why a type was not compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReason {
    /// Skipped type
    pub type_name: String,
    /// Human-readable reason
    pub reason: String,
}

/// Result of compiling one type
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    /// Compiled table
    Compiled(Arc<OperationTable>),
    /// Not compiled; generation continues without it
    Skipped(SkipReason),
}

impl CompileOutcome {
    /// The compiled table, if any
    pub fn table(&self) -> Option<&Arc<OperationTable>> {
        match self {
            CompileOutcome::Compiled(table) => Some(table),
            CompileOutcome::Skipped(_) => None,
        }
    }
}

/// Builds operation tables from catalog descriptors
pub struct ReflectionCompiler<'a> {
    catalog: &'a dyn TypeCatalog,
}

impl<'a> ReflectionCompiler<'a> {
    /// Compiler over `catalog`
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Compile `name`, reusing the cached outcome when present
    pub fn compile(&self, name: &str, cache: &mut CompileCache) -> CompileOutcome {
        if let Some(outcome) = cache.outcome(name) {
            return outcome.clone();
        }
        let outcome = match cache.describe(self.catalog, name) {
            Ok(Some(desc)) => match self.build_table(desc, cache) {
                Ok(table) => CompileOutcome::Compiled(Arc::new(table)),
                Err(reason) => self.skip(name, reason),
            },
            Ok(None) => {
                log::debug!("Compiling {name} as unresolved");
                CompileOutcome::Compiled(Arc::new(OperationTable::unresolved(name)))
            }
            Err(e) => self.skip(name, e.to_string()),
        };
        cache.store_outcome(name, outcome.clone());
        outcome
    }

    fn skip(&self, name: &str, reason: String) -> CompileOutcome {
        log::warn!("Skipping {name}: {reason}");
        CompileOutcome::Skipped(SkipReason {
            type_name: name.to_owned(),
            reason,
        })
    }

    fn build_table(
        &self,
        desc: Arc<TypeDescriptor>,
        cache: &mut CompileCache,
    ) -> Result<OperationTable, String> {
        let constructors = if desc.is_instantiable() {
            desc.constructors
                .iter()
                .filter(|c| c.visibility == Visibility::Public)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let methods = desc
            .methods
            .iter()
            .filter(|m| m.visibility == Visibility::Public)
            .cloned()
            .collect();
        let fields = desc
            .fields
            .iter()
            .filter(|f| f.visibility == Visibility::Public)
            .cloned()
            .collect();
        let proxy_methods = if desc.is_interface() {
            self.proxy_methods(&desc, cache)?
        } else {
            Vec::new()
        };

        Ok(OperationTable {
            type_name: desc.name.clone(),
            descriptor: Some(desc),
            constructors,
            methods,
            fields,
            proxy_methods,
        })
    }

    /// Identity methods of the root type, then a pre-order walk of the
    /// interface and its super-interfaces
    fn proxy_methods(
        &self,
        desc: &TypeDescriptor,
        cache: &mut CompileCache,
    ) -> Result<Vec<ProxyMethod>, String> {
        let mut methods = Vec::new();
        let mut seen: FxHashSet<(String, Vec<String>)> = FxHashSet::default();
        let mut add = |declaring_type: &str, method: &MethodDesc| {
            if seen.insert((method.name.clone(), method.erased_params())) {
                methods.push(ProxyMethod {
                    declaring_type: declaring_type.to_owned(),
                    method: method.clone(),
                });
            }
        };

        for method in universal_methods(self.catalog, cache)? {
            add(OBJECT, &method);
        }

        let mut visited = FxHashSet::default();
        let mut stack = vec![Arc::new(desc.clone())];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.name.clone()) {
                continue;
            }
            for method in current.methods.iter().filter(|m| is_proxyable(m)) {
                add(&current.name, method);
            }
            // Reverse so the first super-interface is walked first.
            for parent in current.interfaces.iter().rev() {
                match cache.describe(self.catalog, parent) {
                    Ok(Some(parent_desc)) => stack.push(parent_desc),
                    Ok(None) => log::debug!("Super-interface {parent} of {} is unresolved", desc.name),
                    Err(e) => return Err(format!("Failed to describe {parent}: {e}")),
                }
            }
        }
        Ok(methods)
    }
}

fn is_proxyable(method: &MethodDesc) -> bool {
    method.visibility == Visibility::Public && !method.is_default && !method.is_static
}

/// `equals`, `hashCode` and `toString` of the root type
///
/// Taken from the catalog when it describes the root type, otherwise
/// synthesized with the standard signatures.
fn universal_methods(
    catalog: &dyn TypeCatalog,
    cache: &mut CompileCache,
) -> Result<Vec<MethodDesc>, String> {
    let fallback = [
        MethodDesc::public("equals", &[OBJECT], "boolean"),
        MethodDesc::public("hashCode", &[], "int"),
        MethodDesc::public("toString", &[], "java.lang.String"),
    ];
    let root = cache
        .describe(catalog, OBJECT)
        .map_err(|e| format!("Failed to describe {OBJECT}: {e}"))?;
    Ok(fallback
        .into_iter()
        .map(|wanted| {
            root.as_deref()
                .and_then(|root| {
                    root.methods.iter().find(|m| {
                        m.name == wanted.name && m.erased_params() == wanted.erased_params()
                    })
                })
                .cloned()
                .unwrap_or(wanted)
        })
        .collect())
}
