//! Dispatch routine interpreter
//!
//! Runs one case of a code unit's routine against a [`Host`]. Cases are
//! straight-line, so execution is a single pass over the ops until
//! `Return`; there are no jumps and no call frames.

use crate::error::{DispatchError, DispatchResult, HostError};
use crate::host::Host;
use crate::value::Value;
use likeness_format::{CodeUnit, InvokeKind, MemberRef, Op, Primitive, RoutineBody, RoutineKind};

/// Callback receiving proxied calls: (proxy method index, boxed arguments)
pub type HandlerFn<'f> = dyn FnMut(u32, Vec<Value>) -> Result<Value, HostError> + 'f;

/// Inputs of one dispatch call
#[derive(Default)]
pub struct Frame<'f> {
    /// Receiver for instance members
    pub receiver: Option<Value>,
    /// Boxed call arguments
    pub args: Vec<Value>,
    /// New value for field writes
    pub value: Option<Value>,
    /// Proxy handler
    pub handler: Option<Box<HandlerFn<'f>>>,
}

impl<'f> Frame<'f> {
    /// Frame with arguments only
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Set the receiver
    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Set the value to store
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Install a proxy handler
    pub fn with_handler(
        mut self,
        handler: impl FnMut(u32, Vec<Value>) -> Result<Value, HostError> + 'f,
    ) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }
}

/// Interpreter for one code unit
pub struct Interpreter<'a> {
    unit: &'a CodeUnit,
    host: &'a mut dyn Host,
    stack: Vec<Value>,
}

impl<'a> Interpreter<'a> {
    /// Interpreter over `unit`, forwarding member operations to `host`
    pub fn new(unit: &'a CodeUnit, host: &'a mut dyn Host) -> Self {
        Self {
            unit,
            host,
            stack: Vec::with_capacity(8),
        }
    }

    /// Run case `index` of the routine of `kind`
    pub fn run(&mut self, kind: RoutineKind, index: u32, mut frame: Frame<'_>) -> DispatchResult<Value> {
        let unit = self.unit;
        let missing = || DispatchError::MissingRoutine {
            unit: unit.name.clone(),
            routine: kind.name(),
        };
        let code = match &unit.routine(kind).ok_or_else(missing)?.body {
            RoutineBody::TableSwitch { cases, failure } => {
                cases
                    .get(index as usize)
                    .ok_or_else(|| DispatchError::InvalidIndex {
                        message: failure.clone(),
                        index,
                    })?
            }
            RoutineBody::LookupSwitch(_) => return Err(missing()),
        };

        self.stack.clear();
        for op in code {
            match *op {
                Op::LoadArg(i) => self.op_load_arg(i, &frame)?,
                Op::LoadReceiver => self.push(frame.receiver.clone().unwrap_or(Value::Null)),
                Op::LoadValue => self.push(frame.value.clone().unwrap_or(Value::Null)),
                Op::ConstNull => self.push(Value::Null),
                Op::Pop => {
                    self.pop()?;
                }
                Op::CheckArity(n) => self.op_check_arity(n, &frame)?,
                Op::Unbox(p) => self.op_unbox(p)?,
                Op::Box(p) => self.op_box(p)?,
                Op::CheckCast(s) => self.op_check_cast(s)?,
                Op::New(m) => self.op_new(m)?,
                Op::Invoke(kind, m) => self.op_invoke(kind, m)?,
                Op::GetField(m) => self.op_get_field(m)?,
                Op::PutField(m) => self.op_put_field(m)?,
                Op::InvokeHandler { method, argc } => {
                    self.op_invoke_handler(method, argc, &mut frame)?
                }
                Op::EnumConstants(s) => self.op_enum_constants(s)?,
                Op::LoadInstance(s) => self.op_load_instance(s)?,
                Op::Return => return self.pop(),
            }
        }
        Err(self.malformed(format!("{} case {index} does not return", kind.name())))
    }

    // ===== Stack =====

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> DispatchResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| self.malformed("stack underflow".to_string()))
    }

    fn pop_n(&mut self, n: usize) -> DispatchResult<Vec<Value>> {
        if self.stack.len() < n {
            return Err(self.malformed("stack underflow".to_string()));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_receiver(&mut self, member: &MemberRef) -> DispatchResult<Value> {
        match self.pop()? {
            Value::Null => Err(DispatchError::NullReceiver(format!(
                "{}.{}",
                member.owner, member.name
            ))),
            receiver => Ok(receiver),
        }
    }

    // ===== Unit references =====

    fn string(&self, index: u32) -> DispatchResult<&'a str> {
        let unit: &'a CodeUnit = self.unit;
        unit.strings
            .get(index)
            .ok_or_else(|| self.malformed(format!("string index {index} out of range")))
    }

    fn member(&self, index: u32) -> DispatchResult<&'a MemberRef> {
        let unit: &'a CodeUnit = self.unit;
        unit.members
            .get(index as usize)
            .ok_or_else(|| self.malformed(format!("member index {index} out of range")))
    }

    fn malformed(&self, message: String) -> DispatchError {
        DispatchError::Malformed {
            unit: self.unit.name.clone(),
            message,
        }
    }

    // ===== Marshalling =====

    fn op_check_arity(&mut self, expected: u16, frame: &Frame<'_>) -> DispatchResult<()> {
        if frame.args.len() != expected as usize {
            return Err(DispatchError::ArityMismatch {
                expected: expected as usize,
                actual: frame.args.len(),
            });
        }
        Ok(())
    }

    fn op_load_arg(&mut self, index: u16, frame: &Frame<'_>) -> DispatchResult<()> {
        let arg = frame.args.get(index as usize).cloned().ok_or_else(|| {
            self.malformed(format!("argument {index} read past the checked arity"))
        })?;
        self.push(arg);
        Ok(())
    }

    fn op_unbox(&mut self, primitive: Primitive) -> DispatchResult<()> {
        let value = match self.pop()? {
            Value::Boxed(v) | Value::Prim(v) if v.primitive() == primitive => v,
            Value::Null => return Err(DispatchError::NullUnbox(primitive)),
            other => {
                return Err(DispatchError::TypeMismatch {
                    expected: primitive.boxed_name().to_owned(),
                    actual: describe(&other),
                })
            }
        };
        self.push(Value::Prim(value));
        Ok(())
    }

    fn op_box(&mut self, primitive: Primitive) -> DispatchResult<()> {
        let value = match self.pop()? {
            Value::Prim(v) | Value::Boxed(v) if v.primitive() == primitive => v,
            other => {
                return Err(DispatchError::TypeMismatch {
                    expected: primitive.keyword().to_owned(),
                    actual: describe(&other),
                })
            }
        };
        self.push(Value::Boxed(value));
        Ok(())
    }

    fn op_check_cast(&mut self, target: u32) -> DispatchResult<()> {
        let target = self.string(target)?;
        let value = self
            .stack
            .last()
            .ok_or_else(|| self.malformed("stack underflow".to_string()))?;
        match value.type_name() {
            None => Ok(()),
            Some(actual) if actual == target => Ok(()),
            Some(_) if self.host.is_instance(value, target) => Ok(()),
            Some(actual) => Err(DispatchError::ClassCast {
                target: target.to_owned(),
                actual: actual.into_owned(),
            }),
        }
    }

    // ===== Member operations =====

    fn op_new(&mut self, index: u32) -> DispatchResult<()> {
        let ctor = self.member(index)?;
        let args = self.pop_n(ctor.params.len())?;
        let instance = self.host.construct(ctor, args)?;
        self.push(instance);
        Ok(())
    }

    fn op_invoke(&mut self, kind: InvokeKind, index: u32) -> DispatchResult<()> {
        let method = self.member(index)?;
        let args = self.pop_n(method.params.len())?;
        let receiver = if kind.has_receiver() {
            Some(self.pop_receiver(method)?)
        } else {
            None
        };
        let result = self.host.invoke(method, receiver.as_ref(), args)?;
        self.push(result);
        Ok(())
    }

    fn op_get_field(&mut self, index: u32) -> DispatchResult<()> {
        let field = self.member(index)?;
        let receiver = if field.is_static {
            None
        } else {
            Some(self.pop_receiver(field)?)
        };
        let value = self.host.get_field(field, receiver.as_ref())?;
        self.push(value);
        Ok(())
    }

    fn op_put_field(&mut self, index: u32) -> DispatchResult<()> {
        let field = self.member(index)?;
        let value = self.pop()?;
        let receiver = if field.is_static {
            None
        } else {
            Some(self.pop_receiver(field)?)
        };
        self.host.put_field(field, receiver.as_ref(), value)?;
        Ok(())
    }

    // ===== Proxies and type-level accessors =====

    fn op_invoke_handler(&mut self, method: u32, argc: u16, frame: &mut Frame<'_>) -> DispatchResult<()> {
        let args = self.pop_n(argc as usize)?;
        let handler = frame.handler.as_mut().ok_or(DispatchError::NoHandler)?;
        let result = handler(method, args)?;
        self.push(result);
        Ok(())
    }

    fn op_enum_constants(&mut self, type_name: u32) -> DispatchResult<()> {
        let type_name = self.string(type_name)?;
        let constants = self.host.enum_constants(type_name)?;
        self.push(Value::array(type_name, constants));
        Ok(())
    }

    fn op_load_instance(&mut self, type_name: u32) -> DispatchResult<()> {
        let type_name = self.string(type_name)?;
        let instance = self.host.object_instance(type_name)?;
        self.push(instance);
        Ok(())
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Prim(p) => p.primitive().keyword().to_owned(),
        other => other
            .type_name()
            .map_or_else(|| "null".to_owned(), |name| name.into_owned()),
    }
}
