//! Host used by unit tests

use crate::error::HostError;
use crate::host::Host;
use crate::value::{ObjectRef, PrimValue, Value};
use likeness_format::MemberRef;
use rustc_hash::FxHashMap;

/// Records calls and keeps field values in a map
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub calls: Vec<String>,
    pub last_args: Vec<Value>,
    fields: FxHashMap<(u64, String), Value>,
    next_id: u64,
}

impl RecordingHost {
    pub fn field(&self, id: u64, name: &str) -> Option<&Value> {
        self.fields.get(&(id, name.to_string()))
    }
}

fn receiver_id(receiver: Option<&Value>) -> u64 {
    receiver.and_then(Value::as_object).map_or(0, |obj| obj.id)
}

impl Host for RecordingHost {
    fn construct(&mut self, ctor: &MemberRef, args: Vec<Value>) -> Result<Value, HostError> {
        self.calls.push(format!("new {}", ctor.owner));
        self.last_args = args;
        self.next_id += 1;
        Ok(Value::from(ObjectRef::new(ctor.owner.as_str(), self.next_id)))
    }

    fn invoke(
        &mut self,
        method: &MemberRef,
        _receiver: Option<&Value>,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        self.calls.push(format!("{}.{}", method.owner, method.name));
        self.last_args = args;
        match method.result.as_str() {
            "void" => Ok(Value::Null),
            "int" => Ok(Value::Prim(PrimValue::Int(42))),
            "java.lang.String" => Ok(Value::from(method.name.as_str())),
            _ => Ok(Value::Null),
        }
    }

    fn get_field(&mut self, field: &MemberRef, receiver: Option<&Value>) -> Result<Value, HostError> {
        let key = (receiver_id(receiver), field.name.clone());
        Ok(self
            .fields
            .get(&key)
            .cloned()
            .unwrap_or(Value::Prim(PrimValue::Int(0))))
    }

    fn put_field(
        &mut self,
        field: &MemberRef,
        receiver: Option<&Value>,
        value: Value,
    ) -> Result<(), HostError> {
        self.fields
            .insert((receiver_id(receiver), field.name.clone()), value);
        Ok(())
    }

    fn is_instance(&self, value: &Value, type_name: &str) -> bool {
        type_name == "java.lang.Object"
            || (value.as_str().is_some() && type_name == "java.lang.CharSequence")
    }

    fn enum_constants(&mut self, type_name: &str) -> Result<Vec<Value>, HostError> {
        Ok(vec![
            Value::from(ObjectRef::new(type_name, 100)),
            Value::from(ObjectRef::new(type_name, 101)),
        ])
    }

    fn object_instance(&mut self, type_name: &str) -> Result<Value, HostError> {
        Ok(Value::from(ObjectRef::new(type_name, 0)))
    }
}
