//! Static metadata model
//!
//! One [`ClassEntry`] per generated type. Entries are what the runtime
//! hands out in answer to reflection-style queries; the dispatch code only
//! knows member indices, and the entries give those indices meaning.

mod codec;
pub mod flags;

pub use codec::{deserialize, serialize, MetadataBlob, MetadataError, METADATA_MAGIC, METADATA_VERSION};
pub use flags::{ClassFlags, ConstructorFlags, FieldFlags, MethodFlags};

use crate::names::simple_name;
use std::collections::BTreeMap;

/// Constant value of an annotation property
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// Absent value
    Null,
    /// String constant
    Str(String),
    /// Boolean constant
    Bool(bool),
    /// 32-bit integer constant
    Int(i32),
    /// 64-bit integer constant
    Long(i64),
    /// 32-bit float constant
    Float(f32),
    /// 64-bit float constant
    Double(f64),
    /// UTF-16 character constant
    Char(u16),
    /// Class literal
    Class(String),
    /// Enum constant
    Enum {
        /// Enum type
        type_name: String,
        /// Constant name
        constant: String,
    },
    /// Array of values
    List(Vec<AnnotationValue>),
}

impl AnnotationValue {
    /// String content for string, class and enum-constant values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(s) | AnnotationValue::Class(s) => Some(s),
            AnnotationValue::Enum { constant, .. } => Some(constant),
            _ => None,
        }
    }
}

/// An annotation applied to a type or member
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEntry {
    /// Annotation type name
    pub class_name: String,
    /// Simple name of the annotation type
    pub simple_name: String,
    /// Source-level qualified name, if it has one
    pub qualified_name: Option<String>,
    /// Property values by name
    pub properties: BTreeMap<String, AnnotationValue>,
}

impl AnnotationEntry {
    /// Annotation with no properties
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            simple_name: simple_name(&class_name).to_owned(),
            qualified_name: Some(class_name.replace('$', ".")),
            class_name,
            properties: BTreeMap::new(),
        }
    }

    /// Property value by name
    pub fn property(&self, name: &str) -> Option<&AnnotationValue> {
        self.properties.get(name)
    }
}

/// A public constructor
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorEntry {
    /// Declaring type
    pub declaring_class: String,
    /// Erased parameter types
    pub parameter_types: Vec<String>,
    /// Visibility
    pub flags: ConstructorFlags,
    /// Annotations on the constructor
    pub annotations: Vec<AnnotationEntry>,
    /// Annotations per parameter
    pub parameter_annotations: Vec<Vec<AnnotationEntry>>,
}

/// A method (declared or proxied)
#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Erased parameter types
    pub parameter_types: Vec<String>,
    /// Erased return type
    pub return_type: String,
    /// Declaring type
    pub declaring_class: String,
    /// Visibility and modifiers
    pub flags: MethodFlags,
    /// Annotations on the method
    pub annotations: Vec<AnnotationEntry>,
    /// Annotations per parameter
    pub parameter_annotations: Vec<Vec<AnnotationEntry>>,
}

impl MethodEntry {
    /// Whether the name and parameter types match
    pub fn matches(&self, name: &str, parameter_types: &[&str]) -> bool {
        self.name == name
            && self.parameter_types.len() == parameter_types.len()
            && self.parameter_types.iter().zip(parameter_types).all(|(a, b)| a == b)
    }
}

/// A public field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    /// Field name
    pub name: String,
    /// Erased field type
    pub type_name: String,
    /// Declaring type
    pub declaring_class: String,
    /// Visibility and modifiers
    pub flags: FieldFlags,
    /// Annotations on the field
    pub annotations: Vec<AnnotationEntry>,
}

/// Metadata for one generated type
///
/// `flags` contains [`ClassFlags::HAS_SUPERCLASS`] exactly when
/// `superclass` is set; [`ClassEntry::new`] and the decoder keep the two
/// in step.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    /// Fully-qualified name
    pub name: String,
    /// Simple name
    pub simple_name: String,
    /// Source-level qualified name (absent for anonymous/local types)
    pub qualified_name: Option<String>,
    /// Structural flags
    pub flags: ClassFlags,
    /// Superclass name
    pub superclass: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Type annotations
    pub annotations: Vec<AnnotationEntry>,
    /// Public constructors, in dispatch index order
    pub constructors: Vec<ConstructorEntry>,
    /// Public declared methods, in dispatch index order
    pub methods: Vec<MethodEntry>,
    /// Public declared fields, in dispatch index order
    pub fields: Vec<FieldEntry>,
    /// Proxy methods, in proxy index order (interfaces only)
    pub proxy_methods: Vec<MethodEntry>,
    /// Enum constant names, in declaration order
    pub enum_constants: Vec<String>,
}

impl ClassEntry {
    /// Entry with no members
    pub fn new(name: impl Into<String>, flags: ClassFlags, superclass: Option<String>) -> Self {
        let name = name.into();
        let mut flags = flags - ClassFlags::HAS_SUPERCLASS;
        if superclass.is_some() {
            flags |= ClassFlags::HAS_SUPERCLASS;
        }
        Self {
            simple_name: simple_name(&name).to_owned(),
            qualified_name: Some(name.replace('$', ".")),
            name,
            flags,
            superclass,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            proxy_methods: Vec::new(),
            enum_constants: Vec::new(),
        }
    }

    /// Interface type
    pub fn is_interface(&self) -> bool {
        self.flags.contains(ClassFlags::INTERFACE)
    }

    /// Abstract type (interfaces included)
    pub fn is_abstract(&self) -> bool {
        self.flags.intersects(ClassFlags::ABSTRACT | ClassFlags::INTERFACE)
    }

    /// Enum type
    pub fn is_enum(&self) -> bool {
        self.flags.contains(ClassFlags::ENUM)
    }

    /// Unresolved placeholder
    pub fn is_unresolved(&self) -> bool {
        self.flags.contains(ClassFlags::UNRESOLVED)
    }

    /// Direct supertypes: superclass first, then interfaces
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }

    /// Index of the constructor with exactly these parameter types
    pub fn find_constructor(&self, parameter_types: &[&str]) -> Option<usize> {
        self.constructors.iter().position(|c| {
            c.parameter_types.len() == parameter_types.len()
                && c.parameter_types.iter().zip(parameter_types).all(|(a, b)| a == b)
        })
    }

    /// Index of the method with this name and parameter types
    pub fn find_method(&self, name: &str, parameter_types: &[&str]) -> Option<usize> {
        self.methods.iter().position(|m| m.matches(name, parameter_types))
    }

    /// Index of the field with this name
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Annotation by type name
    pub fn annotation(&self, class_name: &str) -> Option<&AnnotationEntry> {
        self.annotations.iter().find(|a| a.class_name == class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_superclass_flag_in_step() {
        let entry = ClassEntry::new("a.B", ClassFlags::HAS_SUPERCLASS, None);
        assert!(!entry.flags.contains(ClassFlags::HAS_SUPERCLASS));

        let entry = ClassEntry::new("a.B", ClassFlags::empty(), Some("a.A".to_string()));
        assert!(entry.flags.contains(ClassFlags::HAS_SUPERCLASS));
        assert_eq!(entry.supertypes().collect::<Vec<_>>(), vec!["a.A"]);
    }

    #[test]
    fn test_nested_names() {
        let entry = ClassEntry::new("a.Outer$Inner", ClassFlags::empty(), None);
        assert_eq!(entry.simple_name, "Inner");
        assert_eq!(entry.qualified_name.as_deref(), Some("a.Outer.Inner"));
    }

    #[test]
    fn test_find_members() {
        let mut entry = ClassEntry::new("a.B", ClassFlags::empty(), None);
        entry.methods.push(MethodEntry {
            name: "run".to_string(),
            parameter_types: vec!["int".to_string()],
            return_type: "void".to_string(),
            declaring_class: "a.B".to_string(),
            flags: MethodFlags::PUBLIC,
            annotations: Vec::new(),
            parameter_annotations: vec![Vec::new()],
        });
        assert_eq!(entry.find_method("run", &["int"]), Some(0));
        assert_eq!(entry.find_method("run", &[]), None);
        assert_eq!(entry.find_field("run"), None);
    }
}
