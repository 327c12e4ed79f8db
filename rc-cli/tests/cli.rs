use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn expr_prints_left_folded_tree() {
    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("expr").arg("a - b - c");

    let output_pred = predicate::str::contains("\"kind\": \"binary_operator\"")
        .and(predicate::str::contains("\"op\": \"-\""))
        .and(predicate::str::contains("\"name\": \"c\""));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn expr_reports_parse_errors() {
    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("expr").arg("1 +");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expression parse failed"));
}

#[test]
fn directives_lists_defines_and_includes() {
    let dir = TempDir::new().unwrap();
    let header = write(
        dir.path(),
        "resource.h",
        "#include \"version.h\"\n#define IDD_MAIN 100\nIDD_MAIN DIALOG\n",
    );

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("directives").arg(&header).arg("--format").arg("yaml");

    let output_pred = predicate::str::contains("kind: include")
        .and(predicate::str::contains("kind: define"))
        .and(predicate::str::contains("name: IDD_MAIN"))
        .and(predicate::str::contains("kind: text_block"));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn parse_reads_utf16_files() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "IDI_APP ICON \"app.ico\"\r\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let path = dir.path().join("app.rc");
    fs::write(&path, bytes).unwrap();

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("parse").arg(&path);

    let output_pred = predicate::str::contains("\"type\": \"file_resource\"")
        .and(predicate::str::contains("\"id\": \"IDI_APP\""));

    cmd.assert().success().stdout(output_pred);
}

#[test]
fn parse_failure_shows_source_context() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "broken.rc", "IDI_APP ICON \"app.ico\"\nIDX_B WIDGET 1\n");

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("parse").arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("resource parse failed").and(predicate::str::contains(">>")));
}

#[test]
fn precompile_reports_missing_command() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.rc", "IDI_APP ICON \"app.ico\"\n");

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.current_dir(dir.path())
        .arg("precompile")
        .arg("app.rc")
        .arg("--command")
        .arg("rcscript-no-such-preprocessor");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("command not found: rcscript-no-such-preprocessor"));
}

#[test]
fn precompile_rejects_scripts_outside_the_project() {
    let project = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let rc = write(elsewhere.path(), "app.rc", "IDI_APP ICON \"app.ico\"\n");

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("precompile").arg(&rc).arg("--project-dir").arg(project.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not inside the project directory"));
}

#[test]
fn unknown_config_file_is_an_error() {
    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.arg("expr").arg("1").arg("--config").arg("no-such-rcscript.toml");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[cfg(unix)]
fn executable(dir: &Path, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = write(dir, name, script);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A stand-in preprocessor that prints its last argument unchanged and reports no
/// includes: directive lines survive it and text lines come back as escaped.
#[cfg(unix)]
fn fake_preprocessor(dir: &Path) -> PathBuf {
    executable(dir, "fake-cl", "#!/bin/sh\nfor last; do :; done\ncat \"$last\"\n")
}

#[cfg(unix)]
const DIALOG_RC: &str = "\
#define IDD_MAIN 100
#define IDC_NAME 1001
#include \"missing.h\"
IDD_MAIN DIALOGEX 0, 0, 100, 50
BEGIN
    EDITTEXT IDC_NAME,4,4,90,12
END
";

#[cfg(unix)]
#[test]
fn precompile_strips_directives_and_keeps_symbols() {
    let tools = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let fake = fake_preprocessor(tools.path());
    write(project.path(), "app.rc", DIALOG_RC);

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.current_dir(project.path())
        .arg("precompile")
        .arg("app.rc")
        .arg("--command")
        .arg(&fake);

    cmd.assert().success().stdout(
        predicate::str::contains("EDITTEXT IDC_NAME,4,4,90,12")
            .and(predicate::str::contains("#define").not())
            .and(predicate::str::contains("#include").not()),
    );
}

#[cfg(unix)]
#[test]
fn symbols_resolves_control_ids() {
    let tools = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let fake = fake_preprocessor(tools.path());
    write(project.path(), "app.rc", DIALOG_RC);

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.current_dir(project.path())
        .arg("symbols")
        .arg("app.rc")
        .arg("--command")
        .arg(&fake);

    let output_pred = predicate::str::contains("\"IDD_MAIN\": 100")
        .and(predicate::str::contains("\"name\": \"IDC_NAME\""))
        .and(predicate::str::contains("\"value\": 1001"));

    cmd.assert().success().stdout(output_pred);
}

#[cfg(unix)]
#[test]
fn resources_dumps_precompiled_text_on_parse_failure() {
    let tools = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let fake = fake_preprocessor(tools.path());
    write(project.path(), "app.rc", "#define IDX_B 1\nIDX_B WIDGET 1\n");
    let dump = project.path().join("dump.rc");

    let mut cmd = cargo_bin_cmd!("rcscript");
    cmd.current_dir(project.path())
        .arg("resources")
        .arg("app.rc")
        .arg("--command")
        .arg(&fake)
        .arg("--dump-on-error")
        .arg(&dump);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Precompiled text dumped to"));
    assert_eq!(fs::read_to_string(&dump).unwrap(), "IDX_B WIDGET 1\n");
}

/// Hangs in the second pass, which runs inside the `rcscript-*` scratch directory.
#[cfg(unix)]
const SLOW_PREPROCESSOR: &str = "#!/bin/sh
case \"$(basename \"$PWD\")\" in
    rcscript-*) exec sleep 30 ;;
esac
for last; do :; done
cat \"$last\"
";

#[cfg(unix)]
#[test]
fn interrupt_exits_quietly_and_removes_the_scratch_directory() {
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    let tools = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let temp_root = TempDir::new().unwrap();
    let slow = executable(tools.path(), "slow-cl", SLOW_PREPROCESSOR);
    write(project.path(), "app.rc", DIALOG_RC);

    let scratch_dirs = || -> Vec<PathBuf> {
        fs::read_dir(temp_root.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with("rcscript-"))
            .collect()
    };

    // Its own process group, so the interrupt reaches the preprocessor too, as Ctrl-C
    // in a terminal does.
    let child = Command::new(env!("CARGO_BIN_EXE_rcscript"))
        .current_dir(project.path())
        .env("TMPDIR", temp_root.path())
        .arg("precompile")
        .arg("app.rc")
        .arg("--command")
        .arg(&slow)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    while scratch_dirs().is_empty() {
        assert!(Instant::now() < deadline, "second pass never started");
        std::thread::sleep(Duration::from_millis(20));
    }
    let interrupted = Command::new("sh")
        .arg("-c")
        .arg(format!("kill -INT -{}", child.id()))
        .status()
        .unwrap();
    assert!(interrupted.success());

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(130));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("error"));
    assert!(scratch_dirs().is_empty());
}
