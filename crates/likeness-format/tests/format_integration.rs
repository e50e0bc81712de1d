//! Integration tests for code units carrying metadata

use likeness_format::meta::{deserialize, serialize};
use likeness_format::names::{PROVIDER_SERVICE, REGISTRY_UNIT};
use likeness_format::{
    verify_unit, AnnotationEntry, AnnotationValue, ClassEntry, ClassFlags, CodeUnit, InvokeKind,
    LookupTable, MemberKind, MemberRef, MethodEntry, MethodFlags, Op, Primitive, Routine,
    RoutineBody, RoutineKind, UnitKind,
};

fn service_entry() -> ClassEntry {
    let mut entry = ClassEntry::new("demo.Service", ClassFlags::INTERFACE, None);
    entry.methods.push(MethodEntry {
        name: "size".into(),
        parameter_types: vec![],
        return_type: "int".into(),
        declaring_class: "demo.Service".into(),
        flags: MethodFlags::PUBLIC | MethodFlags::ABSTRACT,
        annotations: vec![],
        parameter_annotations: vec![],
    });
    let mut marker = AnnotationEntry::new("likeness.ProxyTarget");
    marker
        .properties
        .insert("including".into(), AnnotationValue::List(vec![]));
    entry.annotations.push(marker);
    entry
}

#[test]
fn test_type_unit_encode_verify_decode() {
    let mut unit = CodeUnit::new("demo.Service$Likeness", "demo.Service", UnitKind::Type);
    unit.members.push(MemberRef {
        kind: MemberKind::Method,
        owner: "demo.Service".into(),
        name: "size".into(),
        params: vec![],
        result: "int".into(),
        is_static: false,
    });
    let owner = unit.strings.intern("demo.Service");
    unit.routines.push(Routine {
        kind: RoutineKind::Invoke,
        body: RoutineBody::TableSwitch {
            cases: vec![vec![
                Op::CheckArity(0),
                Op::LoadReceiver,
                Op::CheckCast(owner),
                Op::Invoke(InvokeKind::Interface, 0),
                Op::Box(Primitive::Int),
                Op::Return,
            ]],
            failure: "Invalid method index for demo.Service".into(),
        },
    });
    unit.entry_index = Some(0);

    verify_unit(&unit).expect("unit should verify");
    let decoded = CodeUnit::decode(&unit.encode()).expect("Failed to decode");
    verify_unit(&decoded).expect("decoded unit should verify");
    assert_eq!(decoded.routines, unit.routines);
}

#[test]
fn test_registry_unit_embeds_metadata() {
    let entries = vec![service_entry()];
    let blob = serialize(&entries);

    let mut registry = CodeUnit::new(REGISTRY_UNIT, PROVIDER_SERVICE, UnitKind::Registry);
    registry.links.push("demo.Service$Likeness".into());
    registry.routines.push(Routine {
        kind: RoutineKind::ForName,
        body: RoutineBody::LookupSwitch(LookupTable::build([("demo.Service", 0)])),
    });
    registry.metadata = Some(blob.into_bytes());
    verify_unit(&registry).expect("registry should verify");

    let decoded = CodeUnit::decode(&registry.encode()).unwrap();
    let Some(RoutineBody::LookupSwitch(table)) =
        decoded.routine(RoutineKind::ForName).map(|r| &r.body)
    else {
        panic!("registry lost its lookup routine");
    };
    assert_eq!(table.lookup("demo.Service"), Some(0));
    assert_eq!(table.lookup("demo.Other"), None);

    let metadata = deserialize(decoded.metadata.as_deref().unwrap()).unwrap();
    assert_eq!(metadata, entries);
}

#[test]
fn test_registry_link_out_of_range_rejected() {
    let mut registry = CodeUnit::new(REGISTRY_UNIT, PROVIDER_SERVICE, UnitKind::Registry);
    registry.routines.push(Routine {
        kind: RoutineKind::ForName,
        body: RoutineBody::LookupSwitch(LookupTable::build([("demo.Service", 4)])),
    });
    assert!(verify_unit(&registry).is_err());
}
