//! Runtime values
//!
//! Values cross the dispatch boundary boxed: callers pass [`Value::Boxed`]
//! for primitive arguments and receive boxed primitive results. Inside a
//! routine, `Unbox` turns them into [`Value::Prim`] before the host sees
//! them.

use likeness_format::names::OBJECT;
use likeness_format::Primitive;
use std::borrow::Cow;
use std::sync::Arc;

/// A primitive value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimValue {
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char` (one UTF-16 unit)
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
}

impl PrimValue {
    /// Primitive type of this value
    pub fn primitive(self) -> Primitive {
        match self {
            PrimValue::Boolean(_) => Primitive::Boolean,
            PrimValue::Byte(_) => Primitive::Byte,
            PrimValue::Char(_) => Primitive::Char,
            PrimValue::Short(_) => Primitive::Short,
            PrimValue::Int(_) => Primitive::Int,
            PrimValue::Long(_) => Primitive::Long,
            PrimValue::Float(_) => Primitive::Float,
            PrimValue::Double(_) => Primitive::Double,
        }
    }
}

/// Reference to a host object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Runtime type of the object
    pub type_name: Arc<str>,
    /// Host-assigned identity
    pub id: u64,
}

impl ObjectRef {
    /// Create a reference
    pub fn new(type_name: impl Into<Arc<str>>, id: u64) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }
}

/// A value passed to or returned from dispatch code
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null reference
    Null,
    /// Unboxed primitive
    Prim(PrimValue),
    /// Boxed primitive (`java.lang.Integer` and friends)
    Boxed(PrimValue),
    /// String
    Str(Arc<str>),
    /// Host object
    Object(ObjectRef),
    /// Array
    Array {
        /// Component type name
        component: Arc<str>,
        /// Elements
        elements: Arc<[Value]>,
    },
}

impl Value {
    /// Whether this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type name, `None` for null
    ///
    /// Primitive values report their wrapper type, as they would once
    /// observed outside a routine.
    pub fn type_name(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::Prim(p) | Value::Boxed(p) => Some(Cow::Borrowed(p.primitive().boxed_name())),
            Value::Str(_) => Some(Cow::Borrowed("java.lang.String")),
            Value::Object(obj) => Some(Cow::Borrowed(&obj.type_name)),
            Value::Array { component, .. } => Some(Cow::Owned(format!("{component}[]"))),
        }
    }

    /// Primitive content of a boxed or unboxed value
    pub fn as_prim(&self) -> Option<PrimValue> {
        match self {
            Value::Prim(p) | Value::Boxed(p) => Some(*p),
            _ => None,
        }
    }

    /// String content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array { elements, .. } => Some(elements),
            _ => None,
        }
    }

    /// `int` content
    pub fn as_int(&self) -> Option<i32> {
        match self.as_prim()? {
            PrimValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Array of `component` values
    pub fn array(component: &str, elements: Vec<Value>) -> Self {
        Value::Array {
            component: Arc::from(component),
            elements: elements.into(),
        }
    }

    /// Array of objects
    pub fn object_array(elements: Vec<Value>) -> Self {
        Self::array(OBJECT, elements)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boxed(PrimValue::Boolean(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Boxed(PrimValue::Int(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Boxed(PrimValue::Long(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Boxed(PrimValue::Double(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), None);
        assert_eq!(Value::from(3).type_name().unwrap(), "java.lang.Integer");
        assert_eq!(
            Value::Prim(PrimValue::Char(65)).type_name().unwrap(),
            "java.lang.Character"
        );
        assert_eq!(Value::from("x").type_name().unwrap(), "java.lang.String");
        assert_eq!(
            Value::from(ObjectRef::new("a.Person", 1)).type_name().unwrap(),
            "a.Person"
        );
        assert_eq!(
            Value::array("a.Person", vec![]).type_name().unwrap(),
            "a.Person[]"
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(7).as_int(), Some(7));
        assert_eq!(Value::Prim(PrimValue::Int(7)).as_int(), Some(7));
        assert_eq!(Value::from(7i64).as_int(), None);
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::Null.is_null());
        let array = Value::object_array(vec![Value::Null, Value::from(1)]);
        assert_eq!(array.as_array().map(<[Value]>::len), Some(2));
    }
}
