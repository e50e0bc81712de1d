//! Type descriptors as read from catalog documents

use super::shape::TypeShape;
use likeness_format::meta::{AnnotationEntry, AnnotationValue};
use likeness_format::names::simple_name;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Kind of a described type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Class
    #[default]
    Class,
    /// Interface
    Interface,
    /// Enum
    Enum,
    /// Annotation type
    Annotation,
    /// Primitive
    Primitive,
    /// Array
    Array,
}

/// Member or type visibility; omitted means public
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Public
    #[default]
    Public,
    /// Protected
    Protected,
    /// Package-private
    Package,
    /// Private
    Private,
}

/// An annotation as declared on a type, member or parameter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationDesc {
    /// Annotation type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Property values
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl AnnotationDesc {
    /// Annotation with no values
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            values: BTreeMap::new(),
        }
    }

    /// Add a property value
    pub fn with_value(mut self, name: &str, value: serde_json::Value) -> Self {
        self.values.insert(name.to_owned(), value);
        self
    }

    /// String items of a property holding a string, a class reference,
    /// an enum constant, or a list of those
    pub fn strings(&self, property: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(value) = self.values.get(property) {
            collect_strings(value, &mut out);
        }
        out
    }

    /// Convert to a metadata entry
    pub fn to_entry(&self) -> AnnotationEntry {
        let mut entry = AnnotationEntry::new(self.type_name.as_str());
        entry.properties = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), annotation_value(value)))
            .collect();
        entry
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    use serde_json::Value;
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(fields) => {
            if let Some(Value::String(s)) = fields.get("constant").or_else(|| fields.get("class")) {
                out.push(s.clone());
            }
        }
        _ => {}
    }
}

/// Convert a JSON property value to an annotation constant
///
/// Plain JSON maps onto null, bool, int (or long when out of range),
/// double, string and list. Objects select the remaining kinds:
/// `{"class": name}`, `{"enum": type, "constant": name}`, `{"char": "c"}`,
/// `{"long": n}`, `{"float": x}`.
pub fn annotation_value(value: &serde_json::Value) -> AnnotationValue {
    use serde_json::Value;
    match value {
        Value::Null => AnnotationValue::Null,
        Value::Bool(b) => AnnotationValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(i) => AnnotationValue::Int(i),
                    Err(_) => AnnotationValue::Long(i),
                }
            } else {
                AnnotationValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => AnnotationValue::Str(s.clone()),
        Value::Array(items) => AnnotationValue::List(items.iter().map(annotation_value).collect()),
        Value::Object(fields) => {
            let text = |key: &str| fields.get(key).and_then(Value::as_str);
            if let Some(class) = text("class") {
                AnnotationValue::Class(class.to_owned())
            } else if let (Some(type_name), Some(constant)) = (text("enum"), text("constant")) {
                AnnotationValue::Enum {
                    type_name: type_name.to_owned(),
                    constant: constant.to_owned(),
                }
            } else if let Some(c) = text("char") {
                AnnotationValue::Char(c.encode_utf16().next().unwrap_or(0))
            } else if let Some(l) = fields.get("long").and_then(Value::as_i64) {
                AnnotationValue::Long(l)
            } else if let Some(f) = fields.get("float").and_then(Value::as_f64) {
                AnnotationValue::Float(f as f32)
            } else {
                AnnotationValue::Str(value.to_string())
            }
        }
    }
}

/// A constructor or method parameter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterDesc {
    /// Parameter name, when compiled with names
    #[serde(default)]
    pub name: Option<String>,
    /// Parameter type
    #[serde(rename = "type")]
    pub shape: TypeShape,
    /// Parameter annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
}

impl From<&str> for ParameterDesc {
    fn from(text: &str) -> Self {
        Self {
            name: None,
            shape: TypeShape::parse(text),
            annotations: Vec::new(),
        }
    }
}

/// A declared constructor
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConstructorDesc {
    /// Visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDesc>,
    /// Declared exceptions
    #[serde(default)]
    pub throws: Vec<TypeShape>,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
}

impl ConstructorDesc {
    /// Public constructor with unparameterized parameter types
    pub fn public(params: &[&str]) -> Self {
        Self {
            parameters: params.iter().map(|&p| p.into()).collect(),
            ..Self::default()
        }
    }
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodDesc {
    /// Method name
    pub name: String,
    /// Visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Static method
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Final method
    #[serde(default, rename = "final")]
    pub is_final: bool,
    /// Abstract method
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Interface default method
    #[serde(default, rename = "default")]
    pub is_default: bool,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDesc>,
    /// Return type
    #[serde(default = "TypeShape::void")]
    pub returns: TypeShape,
    /// Declared exceptions
    #[serde(default)]
    pub throws: Vec<TypeShape>,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
}

impl MethodDesc {
    /// Public instance method with unparameterized types
    pub fn public(name: &str, params: &[&str], returns: &str) -> Self {
        Self {
            name: name.to_owned(),
            visibility: Visibility::Public,
            is_static: false,
            is_final: false,
            is_abstract: false,
            is_default: false,
            parameters: params.iter().map(|&p| p.into()).collect(),
            returns: TypeShape::parse(returns),
            throws: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Mark static
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as an interface default method
    pub fn into_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Erased parameter types
    pub fn erased_params(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.shape.erasure()).collect()
    }
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDesc {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub shape: TypeShape,
    /// Visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Static field
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Final field
    #[serde(default, rename = "final")]
    pub is_final: bool,
    /// Transient field
    #[serde(default, rename = "transient")]
    pub is_transient: bool,
    /// Volatile field
    #[serde(default, rename = "volatile")]
    pub is_volatile: bool,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
}

impl FieldDesc {
    /// Public instance field
    pub fn public(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_owned(),
            shape: TypeShape::parse(type_name),
            visibility: Visibility::Public,
            is_static: false,
            is_final: false,
            is_transient: false,
            is_volatile: false,
            annotations: Vec::new(),
        }
    }
}

/// Everything the catalog knows about one type
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TypeDescriptor {
    /// Fully-qualified name
    pub name: String,
    /// Kind
    #[serde(default)]
    pub kind: TypeKind,
    /// Superclass
    #[serde(default)]
    pub superclass: Option<String>,
    /// Directly implemented (or extended, for interfaces) interfaces
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Declared constructors
    #[serde(default)]
    pub constructors: Vec<ConstructorDesc>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
    /// Declared fields
    #[serde(default)]
    pub fields: Vec<FieldDesc>,
    /// Type annotations, markers included
    #[serde(default)]
    pub annotations: Vec<AnnotationDesc>,
    /// Abstract class
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Sealed hierarchy
    #[serde(default, rename = "sealed")]
    pub is_sealed: bool,
    /// Data class
    #[serde(default, rename = "data")]
    pub is_data: bool,
    /// Companion object
    #[serde(default, rename = "companion")]
    pub is_companion: bool,
    /// Singleton object
    #[serde(default, rename = "object")]
    pub is_object: bool,
    /// Anonymous or local type, without a source-level qualified name
    #[serde(default, rename = "anonymous")]
    pub is_anonymous: bool,
    /// Enum constants in declaration order
    #[serde(default)]
    pub enum_constants: Vec<String>,
}

impl TypeDescriptor {
    /// A class with no members
    pub fn class(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// An interface with no members
    pub fn interface(name: &str) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::class(name)
        }
    }

    /// An enum with the given constants
    pub fn enumeration(name: &str, constants: &[&str]) -> Self {
        Self {
            kind: TypeKind::Enum,
            superclass: Some("java.lang.Enum".to_owned()),
            enum_constants: constants.iter().map(|&c| c.to_owned()).collect(),
            ..Self::class(name)
        }
    }

    /// Set the superclass
    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_owned());
        self
    }

    /// Add an interface
    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_owned());
        self
    }

    /// Add a constructor
    pub fn with_constructor(mut self, ctor: ConstructorDesc) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Add a method
    pub fn with_method(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a field
    pub fn with_field(mut self, field: FieldDesc) -> Self {
        self.fields.push(field);
        self
    }

    /// Add an annotation
    pub fn annotated(mut self, annotation: AnnotationDesc) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Mark abstract
    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as a singleton object
    pub fn into_object(mut self) -> Self {
        self.is_object = true;
        self
    }

    /// Interface type
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Enum type
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Concrete class or enum, the kinds whose constructors are dispatched
    pub fn is_instantiable(&self) -> bool {
        matches!(self.kind, TypeKind::Class | TypeKind::Enum) && !self.is_abstract
    }

    /// Simple name
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Direct supertypes: superclass first, then interfaces
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }

    /// Annotations of the given type
    pub fn annotations_of<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a AnnotationDesc> {
        self.annotations.iter().filter(move |a| a.type_name == type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_descriptor() {
        let desc: TypeDescriptor = serde_json::from_value(json!({
            "name": "demo.Person",
            "superclass": "java.lang.Object",
            "constructors": [{"parameters": [{"type": "java.lang.String"}]}],
            "methods": [
                {"name": "getName", "returns": "java.lang.String"},
                {"name": "helper", "visibility": "private", "static": true}
            ],
            "fields": [{"name": "age", "type": "int", "final": true}],
            "annotations": [{"type": "likeness.Reflective", "values": {"including": ["ALL_SUBTYPES"]}}]
        }))
        .unwrap();

        assert_eq!(desc.kind, TypeKind::Class);
        assert_eq!(desc.constructors[0].visibility, Visibility::Public);
        assert!(desc.methods[1].is_static);
        assert!(desc.methods[1].returns.is_void());
        assert!(desc.fields[0].is_final);
        assert_eq!(
            desc.annotations[0].strings("including"),
            vec!["ALL_SUBTYPES".to_string()]
        );
    }

    #[test]
    fn test_annotation_value_kinds() {
        assert_eq!(annotation_value(&json!(null)), AnnotationValue::Null);
        assert_eq!(annotation_value(&json!(7)), AnnotationValue::Int(7));
        assert_eq!(
            annotation_value(&json!(10_000_000_000i64)),
            AnnotationValue::Long(10_000_000_000)
        );
        assert_eq!(annotation_value(&json!(0.5)), AnnotationValue::Double(0.5));
        assert_eq!(
            annotation_value(&json!({"class": "a.B"})),
            AnnotationValue::Class("a.B".into())
        );
        assert_eq!(
            annotation_value(&json!({"enum": "a.Mode", "constant": "FAST"})),
            AnnotationValue::Enum {
                type_name: "a.Mode".into(),
                constant: "FAST".into()
            }
        );
        assert_eq!(
            annotation_value(&json!({"char": "x"})),
            AnnotationValue::Char('x' as u16)
        );
    }

    #[test]
    fn test_annotation_strings_from_class_refs() {
        let desc = AnnotationDesc::new("likeness.Reflective$Include")
            .with_value("classes", json!([{"class": "a.B"}, "a.C"]));
        assert_eq!(desc.strings("classes"), vec!["a.B", "a.C"]);
        assert!(desc.strings("including").is_empty());
    }
}
