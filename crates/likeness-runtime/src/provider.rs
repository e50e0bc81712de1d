//! Type providers
//!
//! A [`Provider`] answers `for_name` for the types it knows. Providers are
//! composed into a [`ProviderChain`], consulted highest priority first;
//! the first provider that knows a name wins.
//!
//! The generated provider reads what the build-time generator wrote: the
//! service entry names the registry unit, the registry maps names to
//! type-unit indices and carries the metadata blob, and each type unit is
//! decoded the first time its type is requested.

use crate::error::{DispatchError, DispatchResult, LoadError, TypeNotFound};
use crate::handle::{GeneratedType, TypeHandle};
use crate::host::Host;
use crate::value::Value;
use likeness_format::meta::deserialize;
use likeness_format::names::{
    component_of, is_array, is_primitive, service_entry_path, strip_array, unit_path, OBJECT,
    ARRAY_SUPERTYPES,
};
use likeness_format::{
    ClassEntry, CodeUnit, LookupTable, Primitive, RoutineBody, RoutineKind, UnitKind,
};
use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Priority of the generated provider
pub const GENERATED_PRIORITY: i32 = 150;

/// Priority of the built-in provider
pub const BUILTIN_PRIORITY: i32 = 200;

/// Source of type handles
pub trait Provider: Send + Sync {
    /// Higher priorities are consulted first
    fn priority(&self) -> i32;

    /// Handle for `name`, `None` when this provider does not know it
    fn for_name(&self, name: &str) -> Option<TypeHandle>;
}

// ============================================================================
// Built-in types
// ============================================================================

/// Primitives, their wrappers and arrays
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl Provider for BuiltinProvider {
    fn priority(&self) -> i32 {
        BUILTIN_PRIORITY
    }

    fn for_name(&self, name: &str) -> Option<TypeHandle> {
        if let Some(p) = Primitive::from_keyword(name) {
            return Some(TypeHandle::Primitive(p));
        }
        if let Some(p) = Primitive::from_boxed_name(name) {
            return Some(TypeHandle::Boxed(p));
        }
        let (element, dims) = strip_array(name);
        if dims > 0 && !element.is_empty() && element != "void" {
            return Some(TypeHandle::Array(Arc::from(name)));
        }
        None
    }
}

// ============================================================================
// Generated types
// ============================================================================

/// Where encoded units are read from
enum UnitSource {
    Directory(PathBuf),
    Entries(FxHashMap<String, Vec<u8>>),
}

impl UnitSource {
    fn read(&self, relative: &str) -> Result<Vec<u8>, LoadError> {
        match self {
            UnitSource::Directory(root) => {
                let path = relative.split('/').fold(root.clone(), |p, part| p.join(part));
                if !path.is_file() {
                    return Err(LoadError::MissingEntry(relative.to_owned()));
                }
                fs::read(&path).map_err(|source| LoadError::Io { path, source })
            }
            UnitSource::Entries(entries) => entries
                .get(relative)
                .cloned()
                .ok_or_else(|| LoadError::MissingEntry(relative.to_owned())),
        }
    }

    fn read_unit(&self, name: &str) -> Result<CodeUnit, LoadError> {
        let bytes = self.read(&unit_path(name))?;
        CodeUnit::decode(&bytes).map_err(|source| LoadError::Unit {
            name: name.to_owned(),
            source,
        })
    }

    /// Every entry of a zip archive
    fn archive(path: &Path) -> Result<Self, LoadError> {
        let archive_error = |source| LoadError::Archive {
            path: path.to_path_buf(),
            source,
        };
        let io_error = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::open(path).map_err(io_error)?;
        let mut archive = zip::ZipArchive::new(file).map_err(archive_error)?;
        let mut entries = FxHashMap::default();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(archive_error)?;
            if entry.is_dir() {
                continue;
            }
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(io_error)?;
            entries.insert(entry.name().to_owned(), bytes);
        }
        Ok(UnitSource::Entries(entries))
    }
}

/// Serves types from generator output
///
/// The registry is decoded when the provider is opened. The metadata blob
/// and each type unit are decoded lazily, once.
pub struct GeneratedProvider {
    registry: CodeUnit,
    table: LookupTable,
    source: UnitSource,
    metadata: OnceCell<Vec<ClassEntry>>,
    types: Vec<OnceCell<TypeHandle>>,
}

impl GeneratedProvider {
    /// Open generator output: a directory or a zip archive
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let source = if path.is_dir() {
            UnitSource::Directory(path.to_path_buf())
        } else {
            UnitSource::archive(path)?
        };
        Self::from_source(source)
    }

    /// Serve in-memory units
    pub fn from_units(registry: &CodeUnit, units: &[CodeUnit]) -> Result<Self, LoadError> {
        let mut entries: FxHashMap<String, Vec<u8>> = units
            .iter()
            .chain(std::iter::once(registry))
            .map(|unit| (unit_path(&unit.name), unit.encode()))
            .collect();
        entries.insert(service_entry_path(), format!("{}\n", registry.name).into_bytes());
        Self::from_source(UnitSource::Entries(entries))
    }

    fn from_source(source: UnitSource) -> Result<Self, LoadError> {
        let service = source.read(&service_entry_path())?;
        let service = String::from_utf8_lossy(&service);
        let registry_name = service
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .ok_or(LoadError::EmptyServiceEntry)?;

        let registry = source.read_unit(registry_name)?;
        let table = match registry.routine(RoutineKind::ForName).map(|r| &r.body) {
            Some(RoutineBody::LookupSwitch(table)) if registry.kind == UnitKind::Registry => {
                table.clone()
            }
            _ => return Err(LoadError::NotARegistry(registry_name.to_owned())),
        };
        let types = registry.links.iter().map(|_| OnceCell::new()).collect();

        log::debug!(
            "Loaded registry {} with {} types",
            registry.name,
            registry.links.len()
        );
        Ok(Self {
            registry,
            table,
            source,
            metadata: OnceCell::new(),
            types,
        })
    }

    /// Number of generated types
    pub fn len(&self) -> usize {
        self.registry.links.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.registry.links.is_empty()
    }

    /// Decoded metadata entries, in registry order
    pub fn entries(&self) -> Result<&[ClassEntry], LoadError> {
        self.metadata
            .get_or_try_init(|| {
                let bytes = self
                    .registry
                    .metadata
                    .as_deref()
                    .ok_or_else(|| LoadError::MissingMetadata(self.registry.name.clone()))?;
                Ok(deserialize(bytes)?)
            })
            .map(Vec::as_slice)
    }

    fn load_type(&self, index: usize, name: &str) -> Result<TypeHandle, LoadError> {
        let inconsistent = |message: String| LoadError::Inconsistent {
            name: name.to_owned(),
            message,
        };
        let entry = self
            .entries()?
            .get(index)
            .ok_or_else(|| inconsistent(format!("no metadata entry {index}")))?;
        let link = self
            .registry
            .links
            .get(index)
            .ok_or_else(|| inconsistent(format!("no unit link {index}")))?;
        let unit = self.source.read_unit(link)?;

        if entry.name != name || unit.target != name {
            return Err(inconsistent(format!(
                "entry {index} describes {} and unit {link} targets {}",
                entry.name, unit.target
            )));
        }
        if unit.entry_index != Some(index as u32) {
            return Err(inconsistent(format!("unit {link} is not at entry {index}")));
        }
        Ok(TypeHandle::Generated(Arc::new(GeneratedType::new(
            entry.clone(),
            unit,
        ))))
    }
}

impl Provider for GeneratedProvider {
    fn priority(&self) -> i32 {
        GENERATED_PRIORITY
    }

    fn for_name(&self, name: &str) -> Option<TypeHandle> {
        let index = self.table.lookup(name)? as usize;
        let slot = self.types.get(index)?;
        match slot.get_or_try_init(|| self.load_type(index, name)) {
            Ok(handle) => Some(handle.clone()),
            Err(e) => {
                log::warn!("Failed to load generated type {name}: {e}");
                None
            }
        }
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Providers ordered by priority, highest first
///
/// Providers with equal priority keep their insertion order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain holding the built-in provider
    pub fn with_builtins() -> Self {
        Self::new().with(BuiltinProvider)
    }

    /// Builtins plus the generated output at `path`
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        Ok(Self::with_builtins().with(GeneratedProvider::open(path)?))
    }

    /// Add a provider
    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.add(Arc::new(provider));
        self
    }

    /// Add a shared provider
    pub fn add(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
        self.providers
            .sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Provider priorities, in consultation order
    pub fn priorities(&self) -> Vec<i32> {
        self.providers.iter().map(|p| p.priority()).collect()
    }

    /// Handle for `name`, or `None` when no provider knows it
    pub fn for_name_or_null(&self, name: &str) -> Option<TypeHandle> {
        self.providers.iter().find_map(|p| p.for_name(name))
    }

    /// Handle for `name`
    pub fn for_name(&self, name: &str) -> Result<TypeHandle, TypeNotFound> {
        self.for_name_or_null(name)
            .ok_or_else(|| TypeNotFound(name.to_owned()))
    }

    /// Handle for `name`, or an unresolved placeholder
    pub fn for_name_or_unresolved(&self, name: &str) -> TypeHandle {
        self.for_name_or_null(name)
            .unwrap_or_else(|| TypeHandle::Unresolved(Arc::from(name)))
    }

    /// Whether a value of type `source` can be assigned to `target`
    ///
    /// Identity, wrapper-from-primitive, subtyping through the known
    /// supertypes, and array covariance over reference components.
    pub fn is_assignable(&self, target: &str, source: &str) -> bool {
        if target == source {
            return true;
        }
        if Primitive::from_boxed_name(target).is_some_and(|p| p.keyword() == source) {
            return true;
        }
        if is_primitive(target) || is_primitive(source) {
            return false;
        }

        if let Some(source_component) = component_of(source) {
            return match component_of(target) {
                Some(target_component)
                    if is_primitive(target_component) || is_primitive(source_component) =>
                {
                    target_component == source_component
                }
                Some(target_component) => self.is_assignable(target_component, source_component),
                None => target == OBJECT || ARRAY_SUPERTYPES.contains(&target),
            };
        }
        if is_array(target) {
            return false;
        }
        target == OBJECT || self.is_subtype(source, target)
    }

    /// Whether `target` is a proper supertype of `source`
    pub fn is_subtype(&self, source: &str, target: &str) -> bool {
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([source.to_owned()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let handle = self.for_name_or_unresolved(&name);
            for supertype in handle.supertypes() {
                if supertype == target {
                    return true;
                }
                queue.push_back(supertype.to_owned());
            }
        }
        false
    }

    /// Whether a non-null `value` is an instance of `type_name`
    pub fn is_instance(&self, value: &Value, type_name: &str) -> bool {
        value
            .type_name()
            .is_some_and(|actual| self.is_assignable(type_name, &actual))
    }

    /// Create an instance with the first constructor accepting `args`
    ///
    /// Null matches any reference parameter; a primitive parameter takes
    /// its wrapper.
    pub fn create_instance(
        &self,
        handle: &TypeHandle,
        host: &mut dyn Host,
        args: Vec<Value>,
    ) -> DispatchResult<Value> {
        let ty = handle
            .generated()
            .ok_or_else(|| DispatchError::NotInstantiable(handle.name().to_owned()))?;
        let index = ty
            .entry()
            .constructors
            .iter()
            .position(|ctor| {
                ctor.parameter_types.len() == args.len()
                    && ctor
                        .parameter_types
                        .iter()
                        .zip(&args)
                        .all(|(param, arg)| self.accepts(param, arg))
            })
            .ok_or_else(|| DispatchError::NoMatchingConstructor(handle.name().to_owned()))?;
        ty.construct(host, index as u32, args)
    }

    fn accepts(&self, param: &str, arg: &Value) -> bool {
        match (arg.type_name(), Primitive::from_keyword(param)) {
            (None, primitive) => primitive.is_none(),
            (Some(actual), Some(p)) => actual == p.boxed_name(),
            (Some(actual), None) => self.is_assignable(param, &actual),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use likeness_format::ClassFlags;

    struct Fixed {
        priority: i32,
        types: Vec<TypeHandle>,
    }

    impl Provider for Fixed {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn for_name(&self, name: &str) -> Option<TypeHandle> {
            self.types.iter().find(|t| t.name() == name).cloned()
        }
    }

    fn generated(name: &str, superclass: Option<&str>, interfaces: &[&str]) -> TypeHandle {
        let mut entry = ClassEntry::new(name, ClassFlags::empty(), superclass.map(str::to_owned));
        entry.interfaces = interfaces.iter().map(|&i| i.to_owned()).collect();
        let unit = CodeUnit::new(format!("{name}$Likeness"), name, UnitKind::Type);
        TypeHandle::Generated(Arc::new(GeneratedType::new(entry, unit)))
    }

    fn chain() -> ProviderChain {
        ProviderChain::with_builtins().with(Fixed {
            priority: GENERATED_PRIORITY,
            types: vec![
                generated("a.Animal", None, &["a.Named"]),
                generated("a.Dog", Some("a.Animal"), &[]),
                generated("a.Cat", Some("a.Animal"), &[]),
            ],
        })
    }

    #[test]
    fn test_priority_order() {
        let chain = ProviderChain::new()
            .with(Fixed {
                priority: 10,
                types: vec![TypeHandle::Unresolved(Arc::from("int"))],
            })
            .with(BuiltinProvider)
            .with(Fixed {
                priority: GENERATED_PRIORITY,
                types: vec![],
            });
        assert_eq!(chain.priorities(), vec![200, 150, 10]);
        assert_eq!(
            chain.for_name("int").unwrap(),
            TypeHandle::Primitive(Primitive::Int)
        );
    }

    #[test]
    fn test_lookup_variants() {
        let chain = chain();
        assert_eq!(chain.for_name("a.Dog").unwrap().name(), "a.Dog");
        assert_eq!(
            chain.for_name("a.Fish"),
            Err(TypeNotFound("a.Fish".to_string()))
        );
        assert!(chain.for_name_or_null("a.Fish").is_none());
        assert!(chain.for_name_or_unresolved("a.Fish").is_unresolved());
        assert!(chain.for_name("a.Fish[]").unwrap().is_array());
        assert!(chain.for_name_or_null("void[]").is_none());
    }

    #[test]
    fn test_subtyping() {
        let chain = chain();
        assert!(chain.is_assignable("a.Animal", "a.Dog"));
        assert!(chain.is_assignable("a.Named", "a.Dog"));
        assert!(chain.is_assignable(OBJECT, "a.Dog"));
        assert!(!chain.is_assignable("a.Dog", "a.Animal"));
        assert!(!chain.is_assignable("a.Cat", "a.Dog"));
        assert!(!chain.is_subtype("a.Dog", "a.Dog"));
    }

    #[test]
    fn test_boxing_bridge() {
        let chain = chain();
        assert!(chain.is_assignable("java.lang.Integer", "int"));
        assert!(!chain.is_assignable("int", "java.lang.Integer"));
        assert!(!chain.is_assignable("java.lang.Long", "int"));
        assert!(chain.is_assignable("java.lang.Number", "java.lang.Integer"));
        assert!(chain.is_assignable("java.io.Serializable", "java.lang.Long"));
    }

    #[test]
    fn test_array_covariance() {
        let chain = chain();
        assert!(chain.is_assignable("a.Animal[]", "a.Dog[]"));
        assert!(chain.is_assignable("a.Animal[][]", "a.Dog[][]"));
        assert!(chain.is_assignable("java.lang.Object[]", "a.Dog[]"));
        assert!(!chain.is_assignable("a.Dog[]", "a.Animal[]"));
        assert!(!chain.is_assignable("a.Animal[]", "a.Dog[][]"));
        assert!(chain.is_assignable("java.lang.Object[]", "a.Dog[][]"));

        assert!(chain.is_assignable(OBJECT, "int[]"));
        assert!(chain.is_assignable("java.lang.Cloneable", "a.Dog[]"));
        assert!(chain.is_assignable("java.io.Serializable", "long[][]"));
        assert!(!chain.is_assignable("long[]", "int[]"));
        assert!(!chain.is_assignable("java.lang.Integer[]", "int[]"));
        assert!(!chain.is_assignable("java.lang.Object[]", "int[]"));
        assert!(!chain.is_assignable("int[]", "java.lang.Object[]"));
        assert!(!chain.is_assignable("int[][]", "java.lang.Object[][]"));
        assert!(chain.is_assignable("java.lang.Object[]", "int[][]"));
        assert!(!chain.is_assignable("a.Dog[]", "a.Dog"));
    }

    #[test]
    fn test_is_instance() {
        let chain = chain();
        let dog = Value::from(crate::value::ObjectRef::new("a.Dog", 1));
        assert!(chain.is_instance(&dog, "a.Animal"));
        assert!(!chain.is_instance(&dog, "a.Cat"));
        assert!(!chain.is_instance(&Value::Null, OBJECT));
        assert!(chain.is_instance(&Value::from(1), "java.lang.Number"));
    }
}
