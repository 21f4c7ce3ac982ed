//! Unit tests for CLI commands

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::cli::{run, Cli, CliError, Commands};
use crate::error::ExitCode;
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_generate_defaults() {
    let cli = Cli::try_parse_from(["apigen", "generate"]).unwrap();
    match cli.command {
        Commands::Generate {
            version,
            output,
            template_dir,
        } => {
            assert_eq!(version, "1.0.0");
            assert!(output.is_none());
            assert!(template_dir.is_none());
        }
        other => panic!("Expected Generate, got {other:?}"),
    }
}

#[test]
fn test_generate_with_flags_and_global_config() {
    let cli = Cli::try_parse_from([
        "apigen",
        "generate",
        "--version",
        "2.3.4",
        "-o",
        "out",
        "--template-dir",
        "tpl",
        "--config",
        "apigen.toml",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("apigen.toml")));
    match cli.command {
        Commands::Generate {
            version,
            output,
            template_dir,
        } => {
            assert_eq!(version, "2.3.4");
            assert_eq!(output.unwrap().to_string_lossy(), "out");
            assert_eq!(template_dir.unwrap().to_string_lossy(), "tpl");
        }
        other => panic!("Expected Generate, got {other:?}"),
    }
}

#[test]
fn test_all_commands_parse() {
    for args in [
        vec!["apigen", "discover"],
        vec!["apigen", "templates"],
        vec!["apigen", "--base-dir", "src", "discover"],
    ] {
        assert!(Cli::try_parse_from(&args).is_ok(), "failed to parse {args:?}");
    }
    assert!(Cli::try_parse_from(["apigen", "deploy"]).is_err());
}

struct Workspace {
    tmp: TempDir,
    config: std::path::PathBuf,
}

fn workspace() -> Workspace {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("customer.ts"),
        "// @Entity\nexport interface Customer {\n  id: number;\n  name: string;\n}\n",
    )
    .unwrap();
    let template = tmp.path().join("typescript-azure");
    fs::create_dir_all(&template).unwrap();
    fs::write(template.join("package.json"), r#"{"name": "{project-name}"}"#).unwrap();

    let config = tmp.path().join("apigen.toml");
    fs::write(
        &config,
        format!(
            "language = \"typescript\"\ncloud = \"azure\"\ntracking_marker = \"Entity\"\nsource_paths = [{:?}]\noutput_dir = {:?}\ntemplate_cache_dir = {:?}\n",
            src.display().to_string(),
            tmp.path().join("out").display().to_string(),
            tmp.path().join("cache").display().to_string(),
        ),
    )
    .unwrap();
    Workspace { tmp, config }
}

fn run_args(args: &[&str]) -> (Result<(), CliError>, String) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let result = run(&cli, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn test_discover_prints_entities() {
    let ws = workspace();
    let config = ws.config.to_string_lossy().into_owned();
    let (result, out) = run_args(&["apigen", "discover", "--config", &config]);
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json[0]["name"], "Customer");
    assert_eq!(json[0]["properties"].as_array().unwrap().len(), 2);
}

#[test]
fn test_base_dir_resolves_relative_source_paths() {
    let ws = workspace();
    let config = ws.tmp.path().join("relative.toml");
    fs::write(
        &config,
        format!(
            "language = \"typescript\"\ntracking_marker = \"Entity\"\nsource_paths = [\"src\"]\ntemplate_cache_dir = {:?}\n",
            ws.tmp.path().join("cache").display().to_string(),
        ),
    )
    .unwrap();
    let config = config.to_string_lossy().into_owned();
    let base_dir = ws.tmp.path().to_string_lossy().into_owned();

    let (result, out) = run_args(&[
        "apigen",
        "--base-dir",
        &base_dir,
        "discover",
        "--config",
        &config,
    ]);
    result.unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "Customer");
}

#[test]
fn test_generate_from_local_template() {
    let ws = workspace();
    let config = ws.config.to_string_lossy().into_owned();
    let template = ws.tmp.path().join("typescript-azure");
    let template = template.to_string_lossy().into_owned();
    let (result, out) = run_args(&[
        "apigen",
        "generate",
        "--config",
        &config,
        "--template-dir",
        &template,
        "--version",
        "0.2.0",
    ]);
    result.unwrap();
    assert!(out.starts_with("Generated 3 files"), "{out}");
    let output = ws.tmp.path().join("out");
    assert!(output.join("models/Customer.ts").is_file());
    assert_eq!(
        fs::read_to_string(output.join("package.json")).unwrap(),
        r#"{"name": "typescriptazure"}"#
    );
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let (result, _) = run_args(&["apigen", "discover", "--config", "/nonexistent/apigen.toml"]);
    let err = result.unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::Configuration);
}

#[test]
fn test_output_errors_are_general() {
    let err = CliError::Output(std::io::Error::other("closed pipe"));
    assert_eq!(err.exit_code(), ExitCode::General);
}
