use std::fs;
use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());

    // Check that config file was created
    let config_path = temp_path.join("docflow.toml");
    assert!(config_path.exists());

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[paths]"));
    assert!(content.contains("[retry]"));
    assert!(content.contains("max_attempts = 3"));

    // A second init without --force refuses to overwrite
    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .arg("init")
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");
    assert!(!output.status.success());

    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .args(["init", "--force"])
        .current_dir(temp_path)
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_content = r#"
[retry]
max_attempts = 7

[processor]
kind = "command"
command = "ingest"
"#;
    fs::write(temp_path.join("custom.toml"), config_content).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .args(["--config", "custom.toml", "config"])
        .current_dir(temp_path)
        .env("DOCFLOW_WATCHER__DEBOUNCE_MS", "250")
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("max_attempts = 7"));
    assert!(stdout.contains("kind = \"command\""));
    assert!(stdout.contains("debounce_ms = 250"));
}

#[test]
fn test_run_once_processes_tree() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();
    let inbox = base.join("inbox");
    fs::create_dir_all(inbox.join("reports/2024")).unwrap();
    fs::create_dir_all(inbox.join("empty")).unwrap();
    fs::write(inbox.join("reports/2024/q1.txt"), "quarterly results\n").unwrap();
    fs::write(inbox.join("blank.txt"), "   \n").unwrap();
    fs::write(inbox.join("image.png"), [0x89, b'P', b'N', b'G']).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .args(["run", "--once", "--watch-dir"])
        .arg(&inbox)
        .arg("--saved-dir")
        .arg(base.join("saved"))
        .arg("--error-dir")
        .arg(base.join("error"))
        .current_dir(base)
        .env("DOCFLOW_HEALTH__INTERVAL_SECS", "0")
        .output()
        .expect("Failed to run engine");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(base.join("saved/reports/2024/q1.txt").is_file());
    assert!(!inbox.join("reports").exists());

    let blank_log = fs::read_to_string(base.join("error/blank.txt.log")).unwrap();
    assert!(blank_log.contains("no extractable content"));

    let png_log = fs::read_to_string(base.join("error/image.png.log")).unwrap();
    assert!(png_log.contains("unsupported type"));

    assert!(base.join("error/empty/empty_folder.log").is_file());
    assert!(inbox.is_dir());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("1 saved, 2 failed"));
}

#[test]
fn test_run_rejects_nested_roots() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    let output = Command::new(env!("CARGO_BIN_EXE_docflow"))
        .args(["run", "--once", "--watch-dir", "in", "--saved-dir", "in/saved"])
        .current_dir(base)
        .output()
        .expect("Failed to run engine");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("inside the watch root"));
}
