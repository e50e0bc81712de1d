//! Dispatch code emission
//!
//! Lowers an [`OperationTable`] into a type code unit. Every routine is a
//! table switch over the table's indices with one straight-line case per
//! declaration:
//!
//! ```text
//! CheckArity n
//! [LoadReceiver, CheckCast owner]      ; instance members only
//! LoadArg i, Unbox p | CheckCast t     ; per argument
//! New | Invoke | GetField | PutField   ; the operation
//! Box p | Pop, ConstNull               ; primitive or void result
//! Return
//! ```
//!
//! The registry unit is built separately by [`registry`].

pub mod registry;

use crate::catalog::{FieldDesc, MethodDesc, TypeShape};
use crate::compiler::OperationTable;
use likeness_format::names::{generated_unit_name, OBJECT};
use likeness_format::{
    CodeUnit, InvokeKind, MemberKind, MemberRef, Op, Routine, RoutineBody, RoutineKind, UnitKind,
};

pub use registry::{build_registry, RegistryError};

/// Emitted dispatch code for one type
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCode {
    /// The type's code unit
    pub unit: CodeUnit,
}

impl DispatchCode {
    /// Routine of the given kind
    pub fn routine(&self, kind: RoutineKind) -> Option<&Routine> {
        self.unit.routine(kind)
    }
}

/// Lower `table` into a code unit
pub fn emit(table: &OperationTable) -> DispatchCode {
    let mut emitter = Emitter::new(table);
    emitter.construct();
    emitter.invoke();
    emitter.get_field();
    emitter.set_field();
    if table.is_interface() {
        emitter.proxy();
    }
    emitter.singletons();
    DispatchCode { unit: emitter.unit }
}

struct Emitter<'t> {
    table: &'t OperationTable,
    unit: CodeUnit,
}

impl<'t> Emitter<'t> {
    fn new(table: &'t OperationTable) -> Self {
        let unit = CodeUnit::new(
            generated_unit_name(&table.type_name),
            table.type_name.as_str(),
            UnitKind::Type,
        );
        Self { table, unit }
    }

    fn string(&mut self, s: &str) -> u32 {
        self.unit.strings.intern(s)
    }

    fn member(&mut self, member: MemberRef) -> u32 {
        let index = self.unit.members.len() as u32;
        self.unit.members.push(member);
        index
    }

    fn switch(&mut self, kind: RoutineKind, noun: &str, cases: Vec<Vec<Op>>) {
        let failure = format!("Invalid {noun} index for {}", self.table.type_name);
        self.unit.routines.push(Routine {
            kind,
            body: RoutineBody::TableSwitch { cases, failure },
        });
    }

    /// Arguments 0..n, each converted to its parameter type
    fn load_args(&mut self, code: &mut Vec<Op>, params: &[&TypeShape]) {
        for (i, shape) in params.iter().enumerate() {
            code.push(Op::LoadArg(i as u16));
            self.marshal(code, shape);
        }
    }

    /// Convert the top of stack from a boxed value to `shape`
    fn marshal(&mut self, code: &mut Vec<Op>, shape: &TypeShape) {
        match shape.primitive() {
            Some(p) => code.push(Op::Unbox(p)),
            None => {
                let erased = shape.erasure();
                if erased != OBJECT {
                    code.push(Op::CheckCast(self.string(&erased)));
                }
            }
        }
    }

    fn load_receiver(&mut self, code: &mut Vec<Op>) {
        code.push(Op::LoadReceiver);
        let owner = self.table.type_name.clone();
        code.push(Op::CheckCast(self.string(&owner)));
    }

    fn construct(&mut self) {
        let table = self.table;
        let mut cases = Vec::new();
        if table.is_instantiable() {
            for ctor in &table.constructors {
                let params: Vec<&TypeShape> = ctor.parameters.iter().map(|p| &p.shape).collect();
                let index = self.member(MemberRef {
                    kind: MemberKind::Constructor,
                    owner: table.type_name.clone(),
                    name: MemberRef::CONSTRUCTOR_NAME.to_owned(),
                    params: params.iter().map(|s| s.erasure()).collect(),
                    result: "void".to_owned(),
                    is_static: false,
                });

                let mut code = vec![Op::CheckArity(params.len() as u16)];
                self.load_args(&mut code, &params);
                code.push(Op::New(index));
                code.push(Op::Return);
                cases.push(code);
            }
        }
        self.switch(RoutineKind::Construct, "constructor", cases);
    }

    fn invoke(&mut self) {
        let table = self.table;
        let kind = if table.is_interface() {
            InvokeKind::Interface
        } else {
            InvokeKind::Virtual
        };
        let mut cases = Vec::new();
        for method in &table.methods {
            cases.push(self.invoke_case(method, kind));
        }
        self.switch(RoutineKind::Invoke, "method", cases);
    }

    fn invoke_case(&mut self, method: &MethodDesc, instance_kind: InvokeKind) -> Vec<Op> {
        let params: Vec<&TypeShape> = method.parameters.iter().map(|p| &p.shape).collect();
        let index = self.member(MemberRef {
            kind: MemberKind::Method,
            owner: self.table.type_name.clone(),
            name: method.name.clone(),
            params: method.erased_params(),
            result: method.returns.erasure(),
            is_static: method.is_static,
        });

        let mut code = vec![Op::CheckArity(params.len() as u16)];
        let kind = if method.is_static {
            InvokeKind::Static
        } else {
            self.load_receiver(&mut code);
            instance_kind
        };
        self.load_args(&mut code, &params);
        code.push(Op::Invoke(kind, index));
        box_result(&mut code, &method.returns);
        code.push(Op::Return);
        code
    }

    fn field_ref(&mut self, field: &FieldDesc) -> u32 {
        self.member(MemberRef {
            kind: MemberKind::Field,
            owner: self.table.type_name.clone(),
            name: field.name.clone(),
            params: Vec::new(),
            result: field.shape.erasure(),
            is_static: field.is_static,
        })
    }

    fn get_field(&mut self) {
        let table = self.table;
        let mut cases = Vec::new();
        for field in &table.fields {
            let mut code = vec![Op::CheckArity(0)];
            if !field.is_static {
                self.load_receiver(&mut code);
            }
            code.push(Op::GetField(self.field_ref(field)));
            if let Some(p) = field.shape.primitive() {
                code.push(Op::Box(p));
            }
            code.push(Op::Return);
            cases.push(code);
        }
        self.switch(RoutineKind::GetField, "field", cases);
    }

    fn set_field(&mut self) {
        let table = self.table;
        let mut cases = Vec::new();
        for field in &table.fields {
            let mut code = vec![Op::CheckArity(0)];
            if !field.is_static {
                self.load_receiver(&mut code);
            }
            code.push(Op::LoadValue);
            self.marshal(&mut code, &field.shape);
            code.push(Op::PutField(self.field_ref(field)));
            code.push(Op::ConstNull);
            code.push(Op::Return);
            cases.push(code);
        }
        self.switch(RoutineKind::SetField, "field", cases);
    }

    fn proxy(&mut self) {
        let table = self.table;
        let mut cases = Vec::new();
        for (i, proxied) in table.proxy_methods.iter().enumerate() {
            let method = &proxied.method;
            let argc = method.parameters.len() as u16;
            let mut code = vec![Op::CheckArity(argc)];
            for (arg, param) in method.parameters.iter().enumerate() {
                code.push(Op::LoadArg(arg as u16));
                if let Some(p) = param.shape.primitive() {
                    code.push(Op::Box(p));
                }
            }
            code.push(Op::InvokeHandler {
                method: i as u32,
                argc,
            });
            if method.returns.is_void() {
                code.push(Op::Pop);
                code.push(Op::ConstNull);
            } else {
                self.marshal(&mut code, &method.returns);
            }
            code.push(Op::Return);
            cases.push(code);
        }
        self.switch(RoutineKind::Proxy, "proxy method", cases);
    }

    /// Enum constants and singleton accessors
    fn singletons(&mut self) {
        let Some(desc) = self.table.descriptor.clone() else {
            return;
        };
        if desc.is_enum() {
            let name = self.string(&desc.name);
            let cases = vec![vec![Op::EnumConstants(name), Op::Return]];
            self.switch(RoutineKind::EnumConstants, "enum constants", cases);
        }
        if desc.is_object || desc.is_companion {
            let name = self.string(&desc.name);
            let cases = vec![vec![Op::LoadInstance(name), Op::Return]];
            self.switch(RoutineKind::ObjectInstance, "object instance", cases);
        }
    }
}

/// Box a primitive result; void calls return null
fn box_result(code: &mut Vec<Op>, returns: &TypeShape) {
    if returns.is_void() {
        code.push(Op::Pop);
        code.push(Op::ConstNull);
    } else if let Some(p) = returns.primitive() {
        code.push(Op::Box(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompileCache;
    use crate::catalog::{Catalog, ConstructorDesc, TypeDescriptor};
    use crate::compiler::{CompileOutcome, ReflectionCompiler};
    use likeness_format::{verify_unit, Primitive};
    use std::sync::Arc;

    fn compile(catalog: &Catalog, name: &str) -> Arc<OperationTable> {
        match ReflectionCompiler::new(catalog).compile(name, &mut CompileCache::new()) {
            CompileOutcome::Compiled(table) => table,
            CompileOutcome::Skipped(reason) => panic!("skipped: {reason:?}"),
        }
    }

    fn person() -> Catalog {
        let mut counter = FieldDesc::public("COUNT", "int");
        counter.is_static = true;
        Catalog::builder()
            .input(
                TypeDescriptor::class("a.Person")
                    .with_constructor(ConstructorDesc::public(&["java.lang.String"]))
                    .with_constructor(ConstructorDesc::public(&["java.lang.String", "int"]))
                    .with_method(MethodDesc::public("getName", &[], "java.lang.String"))
                    .with_method(MethodDesc::public("setAge", &["int"], "void"))
                    .with_method(MethodDesc::public("of", &["java.lang.Object"], "a.Person").into_static())
                    .with_field(FieldDesc::public("age", "int"))
                    .with_field(counter),
            )
            .build()
    }

    fn case(code: &DispatchCode, kind: RoutineKind, index: usize) -> Vec<Op> {
        code.routine(kind).unwrap().case(index).unwrap().to_vec()
    }

    #[test]
    fn test_constructor_cases() {
        let code = emit(&compile(&person(), "a.Person"));
        let string = code.unit.strings.index_of("java.lang.String").unwrap();

        assert_eq!(code.unit.name, "a.Person$Likeness");
        assert_eq!(
            case(&code, RoutineKind::Construct, 0),
            vec![
                Op::CheckArity(1),
                Op::LoadArg(0),
                Op::CheckCast(string),
                Op::New(0),
                Op::Return
            ]
        );
        assert_eq!(
            case(&code, RoutineKind::Construct, 1),
            vec![
                Op::CheckArity(2),
                Op::LoadArg(0),
                Op::CheckCast(string),
                Op::LoadArg(1),
                Op::Unbox(Primitive::Int),
                Op::New(1),
                Op::Return
            ]
        );
        verify_unit(&code.unit).unwrap();
    }

    #[test]
    fn test_method_cases() {
        let code = emit(&compile(&person(), "a.Person"));
        let owner = code.unit.strings.index_of("a.Person").unwrap();

        let set_age = case(&code, RoutineKind::Invoke, 1);
        assert_eq!(
            set_age,
            vec![
                Op::CheckArity(1),
                Op::LoadReceiver,
                Op::CheckCast(owner),
                Op::LoadArg(0),
                Op::Unbox(Primitive::Int),
                Op::Invoke(InvokeKind::Virtual, 3),
                Op::Pop,
                Op::ConstNull,
                Op::Return
            ]
        );

        // Object parameters need no cast
        let of = case(&code, RoutineKind::Invoke, 2);
        assert_eq!(
            of,
            vec![
                Op::CheckArity(1),
                Op::LoadArg(0),
                Op::Invoke(InvokeKind::Static, 4),
                Op::Return
            ]
        );
    }

    #[test]
    fn test_field_cases() {
        let code = emit(&compile(&person(), "a.Person"));
        let get_count = case(&code, RoutineKind::GetField, 1);
        assert_eq!(get_count.len(), 4);
        assert!(matches!(get_count[2], Op::Box(Primitive::Int)));

        let set_age = case(&code, RoutineKind::SetField, 0);
        assert!(set_age.contains(&Op::LoadValue));
        assert!(set_age.contains(&Op::Unbox(Primitive::Int)));
        assert_eq!(&set_age[set_age.len() - 2..], &[Op::ConstNull, Op::Return]);
        verify_unit(&code.unit).unwrap();
    }

    #[test]
    fn test_failure_messages_name_the_type() {
        let code = emit(&compile(&person(), "a.Person"));
        match &code.routine(RoutineKind::Construct).unwrap().body {
            RoutineBody::TableSwitch { failure, .. } => {
                assert_eq!(failure, "Invalid constructor index for a.Person")
            }
            RoutineBody::LookupSwitch(_) => panic!("expected a table switch"),
        }
    }

    #[test]
    fn test_interface_proxy_cases() {
        let catalog = Catalog::builder()
            .input(
                TypeDescriptor::interface("a.Counter")
                    .with_method(MethodDesc::public("add", &["int", "java.lang.String"], "long"))
                    .with_method(MethodDesc::public("reset", &[], "void")),
            )
            .build();
        let code = emit(&compile(&catalog, "a.Counter"));

        assert_eq!(code.routine(RoutineKind::Construct).unwrap().case_count(), 0);
        assert_eq!(code.routine(RoutineKind::Proxy).unwrap().case_count(), 5);
        assert!(matches!(
            case(&code, RoutineKind::Invoke, 0)[7],
            Op::Invoke(InvokeKind::Interface, _)
        ));

        assert_eq!(
            case(&code, RoutineKind::Proxy, 3),
            vec![
                Op::CheckArity(2),
                Op::LoadArg(0),
                Op::Box(Primitive::Int),
                Op::LoadArg(1),
                Op::InvokeHandler { method: 3, argc: 2 },
                Op::Unbox(Primitive::Long),
                Op::Return
            ]
        );
        assert_eq!(
            case(&code, RoutineKind::Proxy, 4),
            vec![
                Op::CheckArity(0),
                Op::InvokeHandler { method: 4, argc: 0 },
                Op::Pop,
                Op::ConstNull,
                Op::Return
            ]
        );
        verify_unit(&code.unit).unwrap();
    }

    #[test]
    fn test_enum_and_object_accessors() {
        let catalog = Catalog::builder()
            .input(TypeDescriptor::enumeration("a.Mode", &["FAST", "SLOW"]))
            .input(TypeDescriptor::class("a.Config").into_object())
            .build();

        let mode = emit(&compile(&catalog, "a.Mode"));
        assert_eq!(mode.routine(RoutineKind::EnumConstants).unwrap().case_count(), 1);
        assert!(mode.routine(RoutineKind::ObjectInstance).is_none());

        let config = emit(&compile(&catalog, "a.Config"));
        let name = config.unit.strings.index_of("a.Config").unwrap();
        assert_eq!(
            case(&config, RoutineKind::ObjectInstance, 0),
            vec![Op::LoadInstance(name), Op::Return]
        );
        verify_unit(&config.unit).unwrap();
    }

    #[test]
    fn test_unresolved_type_has_empty_routines() {
        let code = emit(&OperationTable::unresolved("ext.Missing"));
        assert_eq!(code.unit.routines.len(), 4);
        assert!(code.unit.routines.iter().all(|r| r.case_count() == 0));
        assert!(code.unit.members.is_empty());
    }

    #[test]
    fn test_emission_is_deterministic() {
        let table = compile(&person(), "a.Person");
        assert_eq!(emit(&table).unit.encode(), emit(&table).unit.encode());
    }
}
