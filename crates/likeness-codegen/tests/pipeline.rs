//! End-to-end generation tests

use likeness_codegen::catalog::{load_path, parse_document};
use likeness_codegen::{
    open_output, Catalog, ClasslibConfig, CompileCache, Generator, OutputFormat, SeedSet,
};
use likeness_format::meta::deserialize;
use likeness_format::names::{service_entry_path, REGISTRY_UNIT};
use likeness_format::{CodeUnit, RoutineBody, RoutineKind};
use std::fs;
use std::path::Path;

const INPUT: &str = r#"{
  "types": [
    {
      "name": "shop.Order",
      "annotations": [{"type": "likeness.Reflective", "values": {"including": ["PUBLIC_SURFACE"]}}],
      "constructors": [
        {"parameters": [{"type": "java.lang.String"}]},
        {"parameters": [{"type": "java.lang.String"}, {"type": "int"}]}
      ],
      "methods": [
        {"name": "getId", "returns": "java.lang.String"},
        {"name": "lines", "returns": {"shape": "named", "name": "java.util.List", "args": ["shop.Line"]}}
      ],
      "fields": [{"name": "quantity", "type": "int"}]
    },
    {"name": "shop.Line", "constructors": [{"parameters": []}]},
    {
      "name": "shop.Events",
      "kind": "interface",
      "annotations": [{"type": "likeness.ProxyTarget"}],
      "methods": [{"name": "placed", "abstract": true, "parameters": [{"type": "shop.Order"}]}]
    }
  ]
}"#;

fn catalog() -> Catalog {
    let input = parse_document(INPUT, Path::new("input.json")).unwrap();
    let library = ClasslibConfig::default().resolve().unwrap();
    Catalog::builder().with_input(input).with_library(library).build()
}

fn registry_lookup(registry: &CodeUnit, name: &str) -> Option<u32> {
    match &registry.routine(RoutineKind::ForName)?.body {
        RoutineBody::LookupSwitch(table) => table.lookup(name),
        RoutineBody::TableSwitch { .. } => None,
    }
}

#[test]
fn test_generate_directory_output() {
    let catalog = catalog();
    let seeds = SeedSet::from_catalog(&catalog);
    let generated = Generator::new(&catalog)
        .generate(&seeds, &mut CompileCache::new())
        .unwrap();

    assert_eq!(
        generated.report.generated,
        vec!["shop.Events", "java.lang.String", "java.util.List", "shop.Line", "shop.Order"]
    );

    let dir = tempfile::tempdir().unwrap();
    let target = open_output(dir.path(), OutputFormat::Directory).unwrap();
    generated.write_to(target).unwrap();

    assert!(dir.path().join("shop/Order$Likeness.lku").is_file());
    assert!(dir
        .path()
        .join("likeness/generated/jdk/java/lang/String$Likeness.lku")
        .is_file());
    let service = fs::read_to_string(dir.path().join(service_entry_path())).unwrap();
    assert_eq!(service.trim(), REGISTRY_UNIT);

    let bytes = fs::read(dir.path().join("likeness/generated/GeneratedRegistry.lku")).unwrap();
    let registry = CodeUnit::decode(&bytes).unwrap();
    let order = registry_lookup(&registry, "shop.Order").unwrap();
    assert_eq!(registry.links[order as usize], "shop.Order$Likeness");
    assert_eq!(registry_lookup(&registry, "shop.Order2"), None);

    let entries = deserialize(registry.metadata.as_deref().unwrap()).unwrap();
    let entry = &entries[order as usize];
    assert_eq!(entry.name, "shop.Order");
    assert_eq!(entry.find_constructor(&["java.lang.String", "int"]), Some(1));
    assert_eq!(entry.methods[1].return_type, "java.util.List");
}

#[test]
fn test_indices_stable_across_runs() {
    let catalog = catalog();
    let seeds = SeedSet::from_catalog(&catalog);
    let first = Generator::new(&catalog)
        .generate(&seeds, &mut CompileCache::new())
        .unwrap();
    let second = Generator::new(&catalog)
        .generate(&seeds, &mut CompileCache::new())
        .unwrap();

    let encode = |units: &[CodeUnit]| units.iter().map(CodeUnit::encode).collect::<Vec<_>>();
    assert_eq!(encode(&first.units), encode(&second.units));
    assert_eq!(
        first.registry.as_ref().map(CodeUnit::encode),
        second.registry.as_ref().map(CodeUnit::encode)
    );
}

#[test]
fn test_archive_input_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("catalog");
    fs::create_dir(&input_dir).unwrap();
    fs::write(input_dir.join("types.json"), INPUT).unwrap();

    let input = load_path(&input_dir).unwrap();
    let catalog = Catalog::builder().with_input(input).build();
    let generated = Generator::new(&catalog)
        .generate(&SeedSet::from_catalog(&catalog), &mut CompileCache::new())
        .unwrap();

    let jar = dir.path().join("out/generated.jar");
    let target = open_output(&jar, OutputFormat::infer(&jar)).unwrap();
    generated.write_to(target).unwrap();

    let archive = zip::ZipArchive::new(fs::File::open(&jar).unwrap()).unwrap();
    let names: Vec<_> = archive.file_names().collect();
    assert!(names.contains(&"shop/Events$Likeness.lku"));
    assert!(names.contains(&"likeness/generated/GeneratedRegistry.lku"));
    assert!(names.contains(&"META-INF/services/likeness.provider.Provider"));
}
