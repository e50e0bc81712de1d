//! Projection of operation tables onto metadata entries

use crate::catalog::{
    AnnotationDesc, ConstructorDesc, FieldDesc, MethodDesc, ParameterDesc, TypeDescriptor,
    Visibility,
};
use crate::compiler::OperationTable;
use likeness_format::meta::{self, serialize};
use likeness_format::{
    AnnotationEntry, ClassEntry, ClassFlags, ConstructorEntry, ConstructorFlags, FieldEntry,
    FieldFlags, MetadataBlob, MethodEntry, MethodFlags,
};

/// Metadata entry for a compiled table
///
/// Member lists follow the table's order, so entry indices equal dispatch
/// indices.
pub fn class_entry(table: &OperationTable) -> ClassEntry {
    let Some(desc) = table.descriptor.as_deref() else {
        return ClassEntry::new(table.type_name.as_str(), ClassFlags::UNRESOLVED, None);
    };

    let mut entry = ClassEntry::new(desc.name.as_str(), class_flags(desc), desc.superclass.clone());
    if desc.is_anonymous {
        entry.qualified_name = None;
    }
    entry.interfaces = desc.interfaces.clone();
    entry.annotations = annotations(&desc.annotations);
    entry.constructors = table
        .constructors
        .iter()
        .map(|c| constructor_entry(&desc.name, c))
        .collect();
    entry.methods = table
        .methods
        .iter()
        .map(|m| method_entry(&desc.name, m))
        .collect();
    entry.fields = table
        .fields
        .iter()
        .map(|f| field_entry(&desc.name, f))
        .collect();
    entry.proxy_methods = table
        .proxy_methods
        .iter()
        .map(|p| method_entry(&p.declaring_type, &p.method))
        .collect();
    entry.enum_constants = desc.enum_constants.clone();
    entry
}

/// Serialize the entries of `tables`, in order
pub fn serialize_tables<'a>(tables: impl IntoIterator<Item = &'a OperationTable>) -> MetadataBlob {
    let entries: Vec<ClassEntry> = tables.into_iter().map(class_entry).collect();
    serialize(&entries)
}

/// Decode a blob produced by [`serialize_tables`]
pub fn deserialize(blob: &MetadataBlob) -> Result<Vec<ClassEntry>, meta::MetadataError> {
    meta::deserialize(blob.as_bytes())
}

fn class_flags(desc: &TypeDescriptor) -> ClassFlags {
    let mut flags = ClassFlags::empty();
    flags.set(ClassFlags::ABSTRACT, desc.is_abstract);
    flags.set(ClassFlags::SEALED, desc.is_sealed);
    flags.set(ClassFlags::DATA, desc.is_data);
    flags.set(ClassFlags::COMPANION, desc.is_companion);
    flags.set(ClassFlags::OBJECT, desc.is_object);
    flags.set(ClassFlags::ENUM, desc.is_enum());
    flags.set(ClassFlags::INTERFACE, desc.is_interface());
    flags
}

fn annotations(list: &[AnnotationDesc]) -> Vec<AnnotationEntry> {
    list.iter().map(AnnotationDesc::to_entry).collect()
}

fn parameter_annotations(params: &[ParameterDesc]) -> Vec<Vec<AnnotationEntry>> {
    if params.iter().all(|p| p.annotations.is_empty()) {
        return Vec::new();
    }
    params.iter().map(|p| annotations(&p.annotations)).collect()
}

fn constructor_entry(owner: &str, ctor: &ConstructorDesc) -> ConstructorEntry {
    let flags = match ctor.visibility {
        Visibility::Public => ConstructorFlags::PUBLIC,
        Visibility::Protected => ConstructorFlags::PROTECTED,
        Visibility::Private => ConstructorFlags::PRIVATE,
        Visibility::Package => ConstructorFlags::empty(),
    };
    ConstructorEntry {
        declaring_class: owner.to_owned(),
        parameter_types: ctor.parameters.iter().map(|p| p.shape.erasure()).collect(),
        flags,
        annotations: annotations(&ctor.annotations),
        parameter_annotations: parameter_annotations(&ctor.parameters),
    }
}

fn method_entry(owner: &str, method: &MethodDesc) -> MethodEntry {
    let mut flags = match method.visibility {
        Visibility::Public => MethodFlags::PUBLIC,
        Visibility::Protected => MethodFlags::PROTECTED,
        Visibility::Private => MethodFlags::PRIVATE,
        Visibility::Package => MethodFlags::empty(),
    };
    flags.set(MethodFlags::STATIC, method.is_static);
    flags.set(MethodFlags::FINAL, method.is_final);
    flags.set(MethodFlags::ABSTRACT, method.is_abstract);
    flags.set(MethodFlags::DEFAULT, method.is_default);
    MethodEntry {
        name: method.name.clone(),
        parameter_types: method.erased_params(),
        return_type: method.returns.erasure(),
        declaring_class: owner.to_owned(),
        flags,
        annotations: annotations(&method.annotations),
        parameter_annotations: parameter_annotations(&method.parameters),
    }
}

fn field_entry(owner: &str, field: &FieldDesc) -> FieldEntry {
    let mut flags = match field.visibility {
        Visibility::Public => FieldFlags::PUBLIC,
        Visibility::Protected => FieldFlags::PROTECTED,
        Visibility::Private => FieldFlags::PRIVATE,
        Visibility::Package => FieldFlags::empty(),
    };
    flags.set(FieldFlags::STATIC, field.is_static);
    flags.set(FieldFlags::FINAL, field.is_final);
    flags.set(FieldFlags::TRANSIENT, field.is_transient);
    flags.set(FieldFlags::VOLATILE, field.is_volatile);
    FieldEntry {
        name: field.name.clone(),
        type_name: field.shape.erasure(),
        declaring_class: owner.to_owned(),
        flags,
        annotations: annotations(&field.annotations),
    }
}
