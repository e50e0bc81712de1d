//! Interface proxies
//!
//! A [`Proxy`] implements a generated interface by routing every proxy
//! method through the type's `proxy` routine into a single
//! [`ProxyHandler`]. The routine boxes arguments before the handler sees
//! them and converts the handler's result to the declared return type.

use crate::error::{DispatchError, DispatchResult, HostError};
use crate::handle::{GeneratedType, TypeHandle};
use crate::host::Host;
use crate::interpreter::{Frame, Interpreter};
use crate::value::Value;
use likeness_format::{ClassEntry, MethodEntry, RoutineKind};
use std::sync::Arc;

/// Receives every call made on a proxy
pub trait ProxyHandler {
    /// Handle a call of `method` with boxed `args`
    ///
    /// Void methods should return [`Value::Null`].
    fn invoke(&mut self, method: &MethodEntry, args: Vec<Value>) -> Result<Value, HostError>;
}

impl<F> ProxyHandler for F
where
    F: FnMut(&MethodEntry, Vec<Value>) -> Result<Value, HostError>,
{
    fn invoke(&mut self, method: &MethodEntry, args: Vec<Value>) -> Result<Value, HostError> {
        self(method, args)
    }
}

/// An interface implementation backed by a handler
pub struct Proxy<H> {
    ty: Arc<GeneratedType>,
    handler: H,
}

impl<H: ProxyHandler> Proxy<H> {
    /// Proxy for the interface behind `handle`
    pub fn new(handle: &TypeHandle, handler: H) -> DispatchResult<Self> {
        match handle.generated() {
            Some(ty) if ty.entry().is_interface() => Ok(Self {
                ty: Arc::clone(ty),
                handler,
            }),
            _ => Err(DispatchError::NotAnInterface(handle.name().to_owned())),
        }
    }

    /// The proxied interface
    pub fn interface(&self) -> &ClassEntry {
        self.ty.entry()
    }

    /// The handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Call proxy method `index`
    pub fn call(&mut self, host: &mut dyn Host, index: u32, args: Vec<Value>) -> DispatchResult<Value> {
        let entry = self.ty.entry();
        let handler = &mut self.handler;
        let frame = Frame::new(args).with_handler(move |i, args| {
            let method = entry.proxy_methods.get(i as usize).ok_or_else(|| {
                HostError::Unsupported(format!("proxy method {i} of {}", entry.name))
            })?;
            handler.invoke(method, args)
        });
        Interpreter::new(self.ty.unit(), host).run(RoutineKind::Proxy, index, frame)
    }

    /// Call the proxy method with this name and parameter types
    pub fn call_method(
        &mut self,
        host: &mut dyn Host,
        name: &str,
        parameter_types: &[&str],
        args: Vec<Value>,
    ) -> DispatchResult<Value> {
        let index = self
            .interface()
            .proxy_methods
            .iter()
            .position(|m| m.matches(name, parameter_types))
            .ok_or_else(|| DispatchError::NoSuchMethod {
                type_name: self.interface().name.clone(),
                name: name.to_owned(),
            })?;
        self.call(host, index as u32, args)
    }
}
