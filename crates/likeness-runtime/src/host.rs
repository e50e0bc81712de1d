//! Host object model
//!
//! Dispatch routines never touch objects themselves. Every member
//! operation is forwarded to a [`Host`] together with the [`MemberRef`]
//! that names it; the host owns object identity, storage and behavior.

use crate::error::HostError;
use crate::value::Value;
use likeness_format::MemberRef;

/// The object model generated code runs against
pub trait Host {
    /// Create an instance with the given constructor
    fn construct(&mut self, ctor: &MemberRef, args: Vec<Value>) -> Result<Value, HostError>;

    /// Call a method; `receiver` is `None` for static methods
    ///
    /// Void methods return [`Value::Null`].
    fn invoke(
        &mut self,
        method: &MemberRef,
        receiver: Option<&Value>,
        args: Vec<Value>,
    ) -> Result<Value, HostError>;

    /// Read a field; `receiver` is `None` for static fields
    fn get_field(&mut self, field: &MemberRef, receiver: Option<&Value>) -> Result<Value, HostError>;

    /// Write a field; `receiver` is `None` for static fields
    fn put_field(
        &mut self,
        field: &MemberRef,
        receiver: Option<&Value>,
        value: Value,
    ) -> Result<(), HostError>;

    /// Whether a non-null value is an instance of `type_name`
    ///
    /// Only consulted when the value's own type name differs from
    /// `type_name`.
    fn is_instance(&self, value: &Value, type_name: &str) -> bool;

    /// Constants of an enum, in declaration order
    fn enum_constants(&mut self, type_name: &str) -> Result<Vec<Value>, HostError> {
        Err(HostError::Unsupported(format!("enum constants of {type_name}")))
    }

    /// The singleton instance of an object type
    fn object_instance(&mut self, type_name: &str) -> Result<Value, HostError> {
        Err(HostError::Unsupported(format!("object instance of {type_name}")))
    }
}
