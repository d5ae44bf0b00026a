use std::path::Path;
use std::process::{Command, Output};

use horn_ast::{AstBuilder, TypeName, Visibility};

fn write_unit(dir: &Path) -> std::path::PathBuf {
    let ast = AstBuilder::new();
    let x = ast.var("x", TypeName::uint256());
    let body = vec![
        ast.expr_stmt(ast.assign(&x, ast.number(4))),
        ast.expr_stmt(ast.assert(ast.eq(ast.ident(&x), ast.number(4)))),
    ];
    let f = ast.function("set", Visibility::Public, Vec::new(), Vec::new(), body);
    let unit = ast.source_unit("store.sol", vec![ast.contract("Store", vec![x], vec![f])]);

    let path = dir.join("store.ast.json");
    let json = serde_json::to_string_pretty(&unit).expect("serialize AST");
    std::fs::write(&path, json).expect("write AST");
    path
}

fn horn(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_horn"))
        .args(args)
        .current_dir(cwd)
        .env("HORN_LOG", "off")
        .output()
        .expect("spawn horn")
}

fn assert_success(out: &Output) {
    assert!(
        out.status.success(),
        "horn failed: {:?}\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        out.status,
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn export_only_check_writes_queries_and_json_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_unit(dir.path());
    let input = input.to_str().expect("utf-8 path");

    let out = horn(
        &["check", input, "--solver", "none", "--export-queries", "queries", "--json"],
        dir.path(),
    );
    assert_success(&out);

    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout must be the JSON report");
    assert_eq!(report["schema"], "horn.chc.report.v1");
    assert_eq!(report["solver"], "smtlib2");
    assert_eq!(report["ok"], true);
    assert_eq!(report["assertions"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["assertions"][0]["proved"], false);

    let hashes = report["unhandled_queries"].as_array().expect("hash list");
    assert_eq!(hashes.len(), 1);
    let exported = dir
        .path()
        .join("queries")
        .join(format!("{}.smt2", hashes[0].as_str().expect("hash")));
    let query = std::fs::read_to_string(&exported).expect("exported query");
    assert!(query.starts_with("(set-logic HORN)"));
}

#[test]
fn responses_file_answers_exported_query() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_unit(dir.path());
    let input = input.to_str().expect("utf-8 path");

    let first = horn(&["check", input, "--solver", "none", "--json"], dir.path());
    assert_success(&first);
    let report: serde_json::Value = serde_json::from_slice(&first.stdout).expect("json");
    let hash = report["unhandled_queries"][0].as_str().expect("hash").to_string();

    let responses = dir.path().join("responses.json");
    std::fs::write(&responses, format!("{{\"{hash}\": \"sat\"}}")).expect("write responses");

    let second = horn(
        &[
            "check",
            input,
            "--solver",
            "none",
            "--responses",
            responses.to_str().expect("utf-8 path"),
        ],
        dir.path(),
    );
    assert_success(&second);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("Store.set: assertion at"), "{stdout}");
    assert!(stdout.contains("proved safe"), "{stdout}");
    assert!(stdout.contains("1 of 1 assertion(s) proved safe"), "{stdout}");
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("horn.toml"),
        "[solver]\nenabled = []\n\n[output]\nexport_queries = \"out/queries\"\n",
    )
    .expect("write config");
    let input = write_unit(dir.path());

    let out = horn(&["check", input.to_str().expect("utf-8 path")], dir.path());
    assert_success(&out);
    let entries = std::fs::read_dir(dir.path().join("out").join("queries"))
        .expect("export dir")
        .count();
    assert_eq!(entries, 1);
}

#[test]
fn malformed_input_fails_with_a_diagnostic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("broken.json");
    std::fs::write(&input, "{ not json").expect("write");

    let out = horn(&["check", input.to_str().expect("utf-8 path")], dir.path());
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("horn::input"), "{stderr}");
}

#[test]
fn solvers_subcommand_lists_every_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = horn(&["solvers"], dir.path());
    assert_success(&out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    for name in ["z3-lib", "z3", "golem"] {
        assert!(stdout.contains(name), "{stdout}");
    }
}
