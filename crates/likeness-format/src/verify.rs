//! Code unit verification

use crate::names::{name_hash, shard_key};
use crate::opcode::Op;
use crate::unit::{CodeUnit, MemberKind, RoutineBody, RoutineKind, UnitKind};

/// Code unit verification errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    /// A case has no instructions
    #[error("{routine}: case {case} is empty")]
    EmptyCase {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
    },

    /// A case does not end in `Return`, or has code after it
    #[error("{routine}: case {case} does not end with a single return")]
    FallOffEnd {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
    },

    /// Stack underflow
    #[error("{routine}: stack underflow in case {case} at instruction {at}")]
    StackUnderflow {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Instruction offset
        at: usize,
    },

    /// The stack does not hold exactly the return value at `Return`
    #[error("{routine}: case {case} returns with stack depth {depth}")]
    UnbalancedReturn {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Stack depth at the return
        depth: i32,
    },

    /// Invalid string pool reference
    #[error("{routine}: invalid string reference {index} in case {case}")]
    InvalidStringRef {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Offending index
        index: u32,
    },

    /// Invalid member reference
    #[error("{routine}: invalid member reference {index} in case {case}")]
    InvalidMemberRef {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Offending index
        index: u32,
    },

    /// A member operation does not match the referenced member's kind
    #[error("{routine}: case {case} uses member {index} as the wrong kind")]
    MemberKindMismatch {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Offending index
        index: u32,
    },

    /// The arity check disagrees with the member signature
    #[error("{routine}: case {case} checks arity {checked} but member takes {expected}")]
    ArityMismatch {
        /// Routine name
        routine: &'static str,
        /// Case index
        case: usize,
        /// Arity the case checks
        checked: u16,
        /// Parameter count of the member
        expected: usize,
    },

    /// A registry link index is out of range
    #[error("registry entry {name} links to missing unit {target}")]
    InvalidLink {
        /// Registry entry name
        name: String,
        /// Link index
        target: u32,
    },

    /// A registry entry is filed under the wrong shard or bucket
    #[error("registry entry {name} is misplaced")]
    MisplacedEntry {
        /// Registry entry name
        name: String,
    },

    /// A registry routine appears in a type unit, or vice versa
    #[error("routine {0} is not allowed in this unit")]
    MisplacedRoutine(&'static str),
}

/// Verify a code unit's routines
pub fn verify_unit(unit: &CodeUnit) -> Result<(), VerifyError> {
    for routine in &unit.routines {
        let name = routine.kind.name();
        let is_registry_routine = routine.kind == RoutineKind::ForName;
        if is_registry_routine != (unit.kind == UnitKind::Registry) {
            return Err(VerifyError::MisplacedRoutine(name));
        }
        match &routine.body {
            RoutineBody::TableSwitch { cases, .. } => {
                for (index, case) in cases.iter().enumerate() {
                    verify_case(unit, name, index, case)?;
                }
            }
            RoutineBody::LookupSwitch(table) => {
                for shard in &table.shards {
                    for bucket in &shard.buckets {
                        for (entry_name, target) in &bucket.entries {
                            if shard_key(entry_name) != Some(shard.key)
                                || name_hash(entry_name) != bucket.hash
                            {
                                return Err(VerifyError::MisplacedEntry {
                                    name: entry_name.clone(),
                                });
                            }
                            if *target as usize >= unit.links.len() {
                                return Err(VerifyError::InvalidLink {
                                    name: entry_name.clone(),
                                    target: *target,
                                });
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn verify_case(
    unit: &CodeUnit,
    routine: &'static str,
    case: usize,
    ops: &[Op],
) -> Result<(), VerifyError> {
    match ops.iter().position(|op| *op == Op::Return) {
        None if ops.is_empty() => return Err(VerifyError::EmptyCase { routine, case }),
        Some(at) if at == ops.len() - 1 => {}
        _ => return Err(VerifyError::FallOffEnd { routine, case }),
    }

    verify_refs(unit, routine, case, ops)?;
    verify_stack_depth(unit, routine, case, ops)
}

fn verify_refs(
    unit: &CodeUnit,
    routine: &'static str,
    case: usize,
    ops: &[Op],
) -> Result<(), VerifyError> {
    let mut checked_arity = None;
    for op in ops {
        if let Some(index) = op.string_ref() {
            if unit.strings.get(index).is_none() {
                return Err(VerifyError::InvalidStringRef {
                    routine,
                    case,
                    index,
                });
            }
        }
        if let Op::CheckArity(n) = op {
            checked_arity = Some(*n);
        }
        let Some(index) = op.member_ref() else {
            continue;
        };
        let member = unit
            .members
            .get(index as usize)
            .ok_or(VerifyError::InvalidMemberRef {
                routine,
                case,
                index,
            })?;
        let expected_kind = match op {
            Op::New(_) => MemberKind::Constructor,
            Op::Invoke(..) => MemberKind::Method,
            _ => MemberKind::Field,
        };
        if member.kind != expected_kind {
            return Err(VerifyError::MemberKindMismatch {
                routine,
                case,
                index,
            });
        }
        if let Some(checked) = checked_arity {
            if member.kind != MemberKind::Field && checked as usize != member.params.len() {
                return Err(VerifyError::ArityMismatch {
                    routine,
                    case,
                    checked,
                    expected: member.params.len(),
                });
            }
        }
    }
    Ok(())
}

fn verify_stack_depth(
    unit: &CodeUnit,
    routine: &'static str,
    case: usize,
    ops: &[Op],
) -> Result<(), VerifyError> {
    let mut depth: i32 = 0;
    for (at, op) in ops.iter().enumerate() {
        let (pops, pushes) = stack_effect(unit, op);
        if depth < pops {
            return Err(VerifyError::StackUnderflow { routine, case, at });
        }
        if *op == Op::Return && depth != 1 {
            return Err(VerifyError::UnbalancedReturn {
                routine,
                case,
                depth,
            });
        }
        depth = depth - pops + pushes;
    }
    Ok(())
}

/// (pops, pushes) of an instruction; member refs are already validated
fn stack_effect(unit: &CodeUnit, op: &Op) -> (i32, i32) {
    let member = op.member_ref().and_then(|i| unit.members.get(i as usize));
    let receiver = |m: Option<&crate::unit::MemberRef>| match m {
        Some(m) if !m.is_static => 1,
        _ => 0,
    };
    let params = member.map_or(0, |m| m.params.len() as i32);
    match *op {
        Op::LoadArg(_) | Op::LoadReceiver | Op::LoadValue | Op::ConstNull => (0, 1),
        Op::EnumConstants(_) | Op::LoadInstance(_) => (0, 1),
        Op::Pop | Op::Return => (1, 0),
        Op::CheckArity(_) => (0, 0),
        Op::Unbox(_) | Op::Box(_) | Op::CheckCast(_) => (1, 1),
        Op::New(_) => (params, 1),
        Op::Invoke(kind, _) => (params + i32::from(kind.has_receiver()), 1),
        Op::GetField(_) => (receiver(member), 1),
        Op::PutField(_) => (1 + receiver(member), 0),
        Op::InvokeHandler { argc, .. } => (i32::from(argc), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::InvokeKind;
    use crate::unit::{MemberRef, Routine};

    fn unit_with(ops: Vec<Op>) -> CodeUnit {
        let mut unit = CodeUnit::new("a.B$Likeness", "a.B", UnitKind::Type);
        unit.members.push(MemberRef {
            kind: MemberKind::Constructor,
            owner: "a.B".into(),
            name: MemberRef::CONSTRUCTOR_NAME.into(),
            params: vec!["int".into()],
            result: "void".into(),
            is_static: false,
        });
        unit.routines.push(Routine {
            kind: RoutineKind::Construct,
            body: RoutineBody::TableSwitch {
                cases: vec![ops],
                failure: "Invalid constructor index for a.B".into(),
            },
        });
        unit
    }

    #[test]
    fn test_verify_valid_case() {
        let unit = unit_with(vec![
            Op::CheckArity(1),
            Op::LoadArg(0),
            Op::Unbox(crate::names::Primitive::Int),
            Op::New(0),
            Op::Return,
        ]);
        assert_eq!(verify_unit(&unit), Ok(()));
    }

    #[test]
    fn test_verify_empty_case() {
        let unit = unit_with(vec![]);
        assert!(matches!(verify_unit(&unit), Err(VerifyError::EmptyCase { .. })));
    }

    #[test]
    fn test_verify_missing_return() {
        let unit = unit_with(vec![Op::CheckArity(1), Op::LoadArg(0), Op::New(0)]);
        assert!(matches!(verify_unit(&unit), Err(VerifyError::FallOffEnd { .. })));
    }

    #[test]
    fn test_verify_stack_underflow() {
        let unit = unit_with(vec![Op::CheckArity(1), Op::New(0), Op::Return]);
        assert!(matches!(
            verify_unit(&unit),
            Err(VerifyError::StackUnderflow { at: 1, .. })
        ));
    }

    #[test]
    fn test_verify_arity_disagrees_with_member() {
        let unit = unit_with(vec![
            Op::CheckArity(2),
            Op::LoadArg(0),
            Op::LoadArg(1),
            Op::New(0),
            Op::Return,
        ]);
        let err = verify_unit(&unit).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::ArityMismatch { checked: 2, expected: 1, .. }
        ));
        assert_eq!(
            err.to_string(),
            format!("{}: case 0 checks arity 2 but member takes 1", RoutineKind::Construct.name())
        );
    }

    #[test]
    fn test_verify_member_kind() {
        let unit = unit_with(vec![
            Op::CheckArity(1),
            Op::LoadArg(0),
            Op::Invoke(InvokeKind::Static, 0),
            Op::Return,
        ]);
        assert!(matches!(
            verify_unit(&unit),
            Err(VerifyError::MemberKindMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_bad_string_ref() {
        let unit = unit_with(vec![Op::LoadArg(0), Op::CheckCast(9), Op::Return]);
        assert!(matches!(
            verify_unit(&unit),
            Err(VerifyError::InvalidStringRef { index: 9, .. })
        ));
    }
}
