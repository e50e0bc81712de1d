//! Command-line driver tests

use clap::Parser;
use likeness_cli::{run, Cli};
use likeness_codegen::OutputFormat;
use likeness_format::names::{service_entry_path, REGISTRY_UNIT};
use std::fs;
use std::path::Path;

const CATALOG: &str = r#"[
  {
    "name": "app.Model",
    "annotations": [{"type": "likeness.Reflective"}],
    "constructors": [{"parameters": []}]
  },
  {"name": "app.Extra", "constructors": [{"parameters": [{"type": "int"}]}]}
]"#;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("likeness").chain(args.iter().copied())).unwrap()
}

fn write_catalog(dir: &Path) -> String {
    let path = dir.join("types.json");
    fs::write(&path, CATALOG).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_parse_arguments() {
    let cli = parse(&[
        "-i",
        "types.json",
        "-o",
        "out.jar",
        "--classlib-dir",
        "a",
        "--classlib-dir",
        "b",
        "--classlib-jre",
        "/opt/jre",
        "--embedded-classlib",
        "-v",
    ]);
    assert_eq!(cli.output_format(), OutputFormat::Archive);
    let classlib = cli.classlib();
    assert_eq!(classlib.dirs.len(), 2);
    assert_eq!(classlib.runtime_homes.len(), 1);
    assert!(classlib.embedded);
    assert!(cli.verbose);

    let cli = parse(&["-i", "types.json", "-o", "out.jar", "--format", "folder"]);
    assert_eq!(cli.output_format(), OutputFormat::Directory);

    assert!(Cli::try_parse_from(["likeness", "-i", "types.json"]).is_err());
    assert!(Cli::try_parse_from(["likeness", "-i", "a", "-o", "b", "--format", "tar"]).is_err());
}

#[test]
fn test_run_writes_folder_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_catalog(dir.path());
    let output = dir.path().join("generated");

    let report = run(&parse(&["-i", &input, "-o", output.to_str().unwrap()])).unwrap();
    assert_eq!(report.generated, vec!["app.Model"]);

    assert!(output.join("app/Model$Likeness.lku").is_file());
    let service = fs::read_to_string(output.join(service_entry_path())).unwrap();
    assert_eq!(service.trim(), REGISTRY_UNIT);
}

#[test]
fn test_seed_file_adds_types() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_catalog(dir.path());
    let seeds = dir.path().join("seeds.toml");
    fs::write(&seeds, "[[reflective]]\ntype = \"app.Extra\"\n").unwrap();
    let output = dir.path().join("generated.jar");

    let report = run(&parse(&[
        "-i",
        &input,
        "-o",
        output.to_str().unwrap(),
        "--seeds",
        seeds.to_str().unwrap(),
    ]))
    .unwrap();

    assert_eq!(report.generated.len(), 2);
    assert!(report.generated.contains(&"app.Extra".to_string()));
    assert!(output.is_file());
}

#[test]
fn test_invalid_classlib_fails_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_catalog(dir.path());
    let output = dir.path().join("generated");
    let missing = dir.path().join("missing.jar");

    let err = run(&parse(&[
        "-i",
        &input,
        "-o",
        output.to_str().unwrap(),
        "--classlib-jar",
        missing.to_str().unwrap(),
    ]))
    .unwrap_err();

    assert!(err.to_string().contains("class library"));
    assert!(!output.exists());
}
