//! Likeness binary formats
//!
//! This crate defines the dispatch instruction set, the code unit format
//! that carries generated dispatch routines, and the metadata blob that
//! describes every generated type. It is shared by the build-time
//! generator and the runtime.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod meta;
pub mod names;
pub mod opcode;
pub mod pool;
pub mod unit;
pub mod verify;
pub mod width;

pub use encoder::{DecodeError, UnitReader, UnitWriter};
pub use meta::{
    AnnotationEntry, AnnotationValue, ClassEntry, ClassFlags, ConstructorEntry, ConstructorFlags,
    FieldEntry, FieldFlags, MetadataBlob, MetadataError, MethodEntry, MethodFlags,
};
pub use names::Primitive;
pub use opcode::{InvokeKind, Op};
pub use pool::StringPool;
pub use unit::{
    CodeUnit, LookupTable, MemberKind, MemberRef, Routine, RoutineBody, RoutineKind, UnitError,
    UnitKind,
};
pub use verify::{verify_unit, VerifyError};
pub use width::IndexWidth;
