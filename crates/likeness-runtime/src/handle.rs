//! Type handles
//!
//! A [`TypeHandle`] is what a provider hands out for a type name. Generated
//! handles pair the type's metadata entry with its code unit and run
//! dispatch routines on demand; the other kinds only carry a name and the
//! fixed supertypes the type system gives them.

use crate::error::{DispatchError, DispatchResult};
use crate::host::Host;
use crate::interpreter::{Frame, Interpreter};
use crate::value::Value;
use likeness_format::names::{component_of, ARRAY_SUPERTYPES, OBJECT};
use likeness_format::{ClassEntry, CodeUnit, Primitive, RoutineKind};
use std::sync::Arc;

/// A type known to some provider
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHandle {
    /// Type with generated dispatch code
    Generated(Arc<GeneratedType>),
    /// Primitive type
    Primitive(Primitive),
    /// Primitive wrapper type
    Boxed(Primitive),
    /// Array type
    Array(Arc<str>),
    /// Name no provider could resolve
    Unresolved(Arc<str>),
}

impl TypeHandle {
    /// Fully-qualified name
    pub fn name(&self) -> &str {
        match self {
            TypeHandle::Generated(ty) => &ty.entry.name,
            TypeHandle::Primitive(p) => p.keyword(),
            TypeHandle::Boxed(p) => p.boxed_name(),
            TypeHandle::Array(name) | TypeHandle::Unresolved(name) => name,
        }
    }

    /// Primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeHandle::Primitive(_))
    }

    /// Array type
    pub fn is_array(&self) -> bool {
        matches!(self, TypeHandle::Array(_))
    }

    /// Interface type
    pub fn is_interface(&self) -> bool {
        self.entry().is_some_and(ClassEntry::is_interface)
    }

    /// Unresolved placeholder, from a provider miss or an unresolved entry
    pub fn is_unresolved(&self) -> bool {
        match self {
            TypeHandle::Unresolved(_) => true,
            TypeHandle::Generated(ty) => ty.entry.is_unresolved(),
            _ => false,
        }
    }

    /// Component type name of an array
    pub fn component_name(&self) -> Option<&str> {
        match self {
            TypeHandle::Array(name) => component_of(name),
            _ => None,
        }
    }

    /// Metadata entry of a generated type
    pub fn entry(&self) -> Option<&ClassEntry> {
        self.generated().map(|ty| &ty.entry)
    }

    /// Generated type
    pub fn generated(&self) -> Option<&Arc<GeneratedType>> {
        match self {
            TypeHandle::Generated(ty) => Some(ty),
            _ => None,
        }
    }

    /// Direct superclass name
    pub fn superclass(&self) -> Option<&str> {
        match self {
            TypeHandle::Generated(ty) => ty.entry.superclass.as_deref(),
            TypeHandle::Boxed(p) => Some(match p {
                Primitive::Boolean | Primitive::Char | Primitive::Void => OBJECT,
                _ => "java.lang.Number",
            }),
            TypeHandle::Array(_) => Some(OBJECT),
            TypeHandle::Primitive(_) | TypeHandle::Unresolved(_) => None,
        }
    }

    /// Directly implemented interface names
    pub fn interfaces(&self) -> Vec<&str> {
        match self {
            TypeHandle::Generated(ty) => ty.entry.interfaces.iter().map(String::as_str).collect(),
            TypeHandle::Boxed(Primitive::Void) => Vec::new(),
            TypeHandle::Boxed(_) => vec!["java.io.Serializable", "java.lang.Comparable"],
            TypeHandle::Array(_) => ARRAY_SUPERTYPES.to_vec(),
            TypeHandle::Primitive(_) | TypeHandle::Unresolved(_) => Vec::new(),
        }
    }

    /// Superclass then interfaces
    pub fn supertypes(&self) -> Vec<&str> {
        let mut supertypes: Vec<&str> = self.superclass().into_iter().collect();
        supertypes.extend(self.interfaces());
        supertypes
    }
}

/// A generated type: metadata plus dispatch code
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedType {
    entry: ClassEntry,
    unit: CodeUnit,
}

impl GeneratedType {
    /// Pair an entry with its unit
    pub fn new(entry: ClassEntry, unit: CodeUnit) -> Self {
        Self { entry, unit }
    }

    /// Metadata entry
    pub fn entry(&self) -> &ClassEntry {
        &self.entry
    }

    /// Code unit
    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }

    fn run(&self, host: &mut dyn Host, kind: RoutineKind, index: u32, frame: Frame<'_>) -> DispatchResult<Value> {
        Interpreter::new(&self.unit, host).run(kind, index, frame)
    }

    /// Call constructor `index`
    pub fn construct(&self, host: &mut dyn Host, index: u32, args: Vec<Value>) -> DispatchResult<Value> {
        if self.entry.is_abstract() {
            return Err(DispatchError::NotInstantiable(self.entry.name.clone()));
        }
        self.run(host, RoutineKind::Construct, index, Frame::new(args))
    }

    /// Call method `index`; `receiver` is ignored for static methods
    pub fn invoke(
        &self,
        host: &mut dyn Host,
        index: u32,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> DispatchResult<Value> {
        let frame = Frame {
            receiver,
            ..Frame::new(args)
        };
        self.run(host, RoutineKind::Invoke, index, frame)
    }

    /// Call the method with this name and parameter types
    pub fn invoke_method(
        &self,
        host: &mut dyn Host,
        name: &str,
        parameter_types: &[&str],
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> DispatchResult<Value> {
        let index = self
            .entry
            .find_method(name, parameter_types)
            .ok_or_else(|| DispatchError::NoSuchMethod {
                type_name: self.entry.name.clone(),
                name: name.to_owned(),
            })?;
        self.invoke(host, index as u32, receiver, args)
    }

    /// Read field `index`
    pub fn get_field(&self, host: &mut dyn Host, index: u32, receiver: Option<Value>) -> DispatchResult<Value> {
        let frame = Frame {
            receiver,
            ..Frame::default()
        };
        self.run(host, RoutineKind::GetField, index, frame)
    }

    /// Write field `index`
    pub fn set_field(
        &self,
        host: &mut dyn Host,
        index: u32,
        receiver: Option<Value>,
        value: Value,
    ) -> DispatchResult<()> {
        let frame = Frame {
            receiver,
            value: Some(value),
            ..Frame::default()
        };
        self.run(host, RoutineKind::SetField, index, frame)?;
        Ok(())
    }

    /// Enum constants, `None` for non-enum types
    pub fn enum_constants(&self, host: &mut dyn Host) -> DispatchResult<Option<Vec<Value>>> {
        if !self.entry.is_enum() {
            return Ok(None);
        }
        let constants = self.run(host, RoutineKind::EnumConstants, 0, Frame::default())?;
        Ok(constants.as_array().map(<[Value]>::to_vec))
    }

    /// Singleton instance, `None` for types that are not objects
    pub fn object_instance(&self, host: &mut dyn Host) -> DispatchResult<Option<Value>> {
        if self.unit.routine(RoutineKind::ObjectInstance).is_none() {
            return Ok(None);
        }
        self.run(host, RoutineKind::ObjectInstance, 0, Frame::default())
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use likeness_format::ClassFlags;

    #[test]
    fn test_builtin_supertypes() {
        let int = TypeHandle::Boxed(Primitive::Int);
        assert_eq!(int.name(), "java.lang.Integer");
        assert_eq!(
            int.supertypes(),
            vec!["java.lang.Number", "java.io.Serializable", "java.lang.Comparable"]
        );
        assert_eq!(TypeHandle::Boxed(Primitive::Boolean).superclass(), Some(OBJECT));
        assert!(TypeHandle::Primitive(Primitive::Int).supertypes().is_empty());

        let array = TypeHandle::Array(Arc::from("a.B[][]"));
        assert_eq!(array.component_name(), Some("a.B[]"));
        assert_eq!(
            array.supertypes(),
            vec![OBJECT, "java.lang.Cloneable", "java.io.Serializable"]
        );
    }

    #[test]
    fn test_generated_handle() {
        let mut entry = ClassEntry::new("a.Shape", ClassFlags::INTERFACE, None);
        entry.interfaces.push("a.Named".to_string());
        let unit = CodeUnit::new("a.Shape$Likeness", "a.Shape", likeness_format::UnitKind::Type);
        let handle = TypeHandle::Generated(Arc::new(GeneratedType::new(entry, unit)));

        assert_eq!(handle.name(), "a.Shape");
        assert!(handle.is_interface());
        assert!(!handle.is_unresolved());
        assert_eq!(handle.supertypes(), vec!["a.Named"]);
        assert!(TypeHandle::Unresolved(Arc::from("x.Y")).is_unresolved());
    }
}
