use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn parahost_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("parahost").unwrap();
    cmd.current_dir(dir.path()).env_remove("PARAHOST_RANKS");
    cmd
}

fn workspace(driver: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("driver.phs"), driver).unwrap();
    dir
}

#[test]
fn test_run_prints_and_succeeds() {
    let dir = workspace("fn main() { print(\"energy\", 1 + 2); }");
    parahost_cmd(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("energy 3"));
}

#[test]
fn test_driver_arguments_pass_through() {
    let dir = workspace("fn main() { print(len(argv()), argv()[1]); }");
    parahost_cmd(&dir)
        .args(["run", "--", "gs.gpw", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 --dry-run"));
}

#[test]
fn test_exit_codes() {
    let dir = workspace("fn main() { fail(\"no convergence\"); }");
    parahost_cmd(&dir)
        .args(["run", "--module", "absent"])
        .assert()
        .code(3);
    parahost_cmd(&dir)
        .args(["run", "--entry", "relax"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("has no function relax"));
    parahost_cmd(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no convergence"));
}

#[test]
fn test_usage_errors_have_their_own_code() {
    let dir = workspace("fn main() { }");
    fs::write(dir.path().join("parahost.json"), "{ not json").unwrap();
    parahost_cmd(&dir)
        .arg("run")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Failed to parse config"));

    parahost_cmd(&dir).args(["run", "--bogus"]).assert().code(64);
    parahost_cmd(&dir).arg("--help").assert().success();
}

#[test]
fn test_search_path_option() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("drivers")).unwrap();
    fs::write(
        dir.path().join("drivers").join("relax.phs"),
        "fn main() { print(\"relaxed\"); }",
    )
    .unwrap();
    parahost_cmd(&dir)
        .args(["run", "-I", "drivers", "--module", "relax"])
        .assert()
        .success()
        .stdout(predicate::str::contains("relaxed"));
}

#[cfg(feature = "distributed")]
#[test]
fn test_many_ranks() {
    let dir = workspace(
        r#"
        import _parahost;
        fn main() {
            let greeting = _parahost.globally_broadcast_bytes("hello from 0");
            if _parahost.rank() == 2 { print(str(greeting), _parahost.size()); }
        }
        "#,
    );
    parahost_cmd(&dir)
        .args(["run", "--ranks", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from 0 3"));
}

#[test]
fn test_ops_lists_registry() {
    let dir = tempfile::tempdir().unwrap();
    parahost_cmd(&dir)
        .arg("ops")
        .assert()
        .success()
        .stdout(predicate::str::contains("globally_broadcast_bytes"))
        .stdout(predicate::str::contains("operations"));
    parahost_cmd(&dir)
        .args(["ops", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"scal\""));
}

#[test]
fn test_check() {
    let dir = workspace("import _parahost;\nfn main() { return 1; }\n");
    parahost_cmd(&dir)
        .args(["check", "driver.phs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (2 items, 1 functions)"));

    fs::write(dir.path().join("broken.phs"), "fn main() {\n    let x = ;\n}\n").unwrap();
    parahost_cmd(&dir)
        .args(["check", "broken.phs"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("line 2"));
}
