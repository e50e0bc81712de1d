//! Likeness runtime
//!
//! Loads the output of the build-time generator and answers
//! reflection-style queries from it: type lookup by name through
//! prioritized providers, constructor/method/field dispatch by index,
//! interface proxies and assignability checks. No runtime introspection
//! is involved; every member operation goes through generated dispatch
//! code and lands on a [`Host`].
//!
//! # Example
//!
//! ```no_run
//! # fn demo(host: &mut dyn likeness_runtime::Host) -> Result<(), Box<dyn std::error::Error>> {
//! use likeness_runtime::{ProviderChain, Value};
//! use std::path::Path;
//!
//! let chain = ProviderChain::load(Path::new("generated.jar"))?;
//! let person = chain.for_name("com.example.Person")?;
//! let _ada = chain.create_instance(&person, host, vec![Value::from("Ada"), Value::from(36)])?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod handle;
pub mod host;
pub mod interpreter;
pub mod provider;
pub mod proxy;
pub mod value;

#[cfg(test)]
mod testing;

pub use error::{DispatchError, DispatchResult, HostError, LoadError, TypeNotFound};
pub use handle::{GeneratedType, TypeHandle};
pub use host::Host;
pub use interpreter::{Frame, Interpreter};
pub use provider::{
    BuiltinProvider, GeneratedProvider, Provider, ProviderChain, BUILTIN_PRIORITY,
    GENERATED_PRIORITY,
};
pub use proxy::{Proxy, ProxyHandler};
pub use value::{ObjectRef, PrimValue, Value};
