//! Dispatch instructions
//!
//! Dispatch routines are straight-line stack code. Each case of a routine
//! consumes the call's arguments, performs exactly one member operation
//! and returns one value.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Loads and stack manipulation
//! - 0x10-0x1F: Marshalling (arity checks, boxing, casts)
//! - 0x20-0x2F: Member operations
//! - 0x30-0x3F: Proxy forwarding and type-level accessors
//! - 0xF0: Return

use crate::encoder::{DecodeError, UnitReader, UnitWriter};
use crate::names::Primitive;

/// How a method is invoked
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// Virtual dispatch on a class receiver
    Virtual = 0,
    /// Dispatch on an interface receiver
    Interface = 1,
    /// No receiver
    Static = 2,
    /// Exact target, no dynamic dispatch
    Special = 3,
}

impl InvokeKind {
    /// Parse an operand tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(InvokeKind::Virtual),
            1 => Some(InvokeKind::Interface),
            2 => Some(InvokeKind::Static),
            3 => Some(InvokeKind::Special),
            _ => None,
        }
    }

    /// Whether the invocation pops a receiver
    pub fn has_receiver(self) -> bool {
        self != InvokeKind::Static
    }
}

/// A single dispatch instruction
///
/// `u32` operands are string pool indices (type names) or member table
/// indices, as noted per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Push argument `n`
    LoadArg(u16),
    /// Push the call's receiver (null when absent)
    LoadReceiver,
    /// Push the value being stored by a field write
    LoadValue,
    /// Push null
    ConstNull,
    /// Discard the top of stack
    Pop,

    /// Fail unless the call received exactly `n` arguments
    CheckArity(u16),
    /// Unwrap a boxed value of the given primitive type
    Unbox(Primitive),
    /// Wrap a raw primitive value
    Box(Primitive),
    /// Fail unless the top of stack is null or an instance of the type (string index)
    CheckCast(u32),

    /// Construct through the constructor at a member index
    New(u32),
    /// Invoke the method at a member index
    Invoke(InvokeKind, u32),
    /// Read the field at a member index
    GetField(u32),
    /// Write the field at a member index
    PutField(u32),

    /// Forward proxy method `method` with `argc` stacked arguments to the handler
    InvokeHandler {
        /// Proxy method index
        method: u32,
        /// Number of arguments to pop
        argc: u16,
    },
    /// Push the constants of an enum type (string index)
    EnumConstants(u32),
    /// Push the singleton instance of an object type (string index)
    LoadInstance(u32),

    /// Pop and return the top of stack
    Return,
}

impl Op {
    /// Opcode byte
    pub fn opcode(&self) -> u8 {
        match self {
            Op::LoadArg(_) => 0x01,
            Op::LoadReceiver => 0x02,
            Op::LoadValue => 0x03,
            Op::ConstNull => 0x04,
            Op::Pop => 0x05,
            Op::CheckArity(_) => 0x10,
            Op::Unbox(_) => 0x11,
            Op::Box(_) => 0x12,
            Op::CheckCast(_) => 0x13,
            Op::New(_) => 0x20,
            Op::Invoke(..) => 0x21,
            Op::GetField(_) => 0x22,
            Op::PutField(_) => 0x23,
            Op::InvokeHandler { .. } => 0x30,
            Op::EnumConstants(_) => 0x31,
            Op::LoadInstance(_) => 0x32,
            Op::Return => 0xF0,
        }
    }

    /// String pool index referenced by this instruction, if any
    pub fn string_ref(&self) -> Option<u32> {
        match *self {
            Op::CheckCast(index) | Op::EnumConstants(index) | Op::LoadInstance(index) => {
                Some(index)
            }
            _ => None,
        }
    }

    /// Member table index referenced by this instruction, if any
    pub fn member_ref(&self) -> Option<u32> {
        match *self {
            Op::New(index) | Op::Invoke(_, index) | Op::GetField(index) | Op::PutField(index) => {
                Some(index)
            }
            _ => None,
        }
    }

    /// Encode this instruction
    pub fn encode(&self, writer: &mut UnitWriter) {
        writer.emit_u8(self.opcode());
        match *self {
            Op::LoadArg(n) | Op::CheckArity(n) => writer.emit_u16(n),
            Op::Unbox(p) | Op::Box(p) => writer.emit_u8(p.to_u8()),
            Op::CheckCast(index)
            | Op::New(index)
            | Op::GetField(index)
            | Op::PutField(index)
            | Op::EnumConstants(index)
            | Op::LoadInstance(index) => writer.emit_u32(index),
            Op::Invoke(kind, index) => {
                writer.emit_u8(kind as u8);
                writer.emit_u32(index);
            }
            Op::InvokeHandler { method, argc } => {
                writer.emit_u32(method);
                writer.emit_u16(argc);
            }
            Op::LoadReceiver | Op::LoadValue | Op::ConstNull | Op::Pop | Op::Return => {}
        }
    }

    /// Decode one instruction
    pub fn decode(reader: &mut UnitReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let opcode = reader.read_u8()?;
        let op = match opcode {
            0x01 => Op::LoadArg(reader.read_u16()?),
            0x02 => Op::LoadReceiver,
            0x03 => Op::LoadValue,
            0x04 => Op::ConstNull,
            0x05 => Op::Pop,
            0x10 => Op::CheckArity(reader.read_u16()?),
            0x11 => Op::Unbox(read_primitive(reader)?),
            0x12 => Op::Box(read_primitive(reader)?),
            0x13 => Op::CheckCast(reader.read_u32()?),
            0x20 => Op::New(reader.read_u32()?),
            0x21 => {
                let tag_offset = reader.position();
                let tag = reader.read_u8()?;
                let kind = InvokeKind::from_u8(tag).ok_or(DecodeError::InvalidTag {
                    what: "invoke kind",
                    tag,
                    offset: tag_offset,
                })?;
                Op::Invoke(kind, reader.read_u32()?)
            }
            0x22 => Op::GetField(reader.read_u32()?),
            0x23 => Op::PutField(reader.read_u32()?),
            0x30 => Op::InvokeHandler {
                method: reader.read_u32()?,
                argc: reader.read_u16()?,
            },
            0x31 => Op::EnumConstants(reader.read_u32()?),
            0x32 => Op::LoadInstance(reader.read_u32()?),
            0xF0 => Op::Return,
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "opcode",
                    tag,
                    offset,
                })
            }
        };
        Ok(op)
    }
}

fn read_primitive(reader: &mut UnitReader<'_>) -> Result<Primitive, DecodeError> {
    let offset = reader.position();
    let tag = reader.read_u8()?;
    Primitive::from_u8(tag).ok_or(DecodeError::InvalidTag {
        what: "primitive",
        tag,
        offset,
    })
}
