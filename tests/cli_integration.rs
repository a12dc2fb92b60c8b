// CLI integration tests for the v0.1.0 create/list/verify flows.
use std::fs;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_mshar");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

#[test]
fn create_list_verify_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let alpha = temp.path().join("alpha.txt");
    fs::write(&alpha, b"alpha file\n").expect("write alpha");
    let beta = temp.path().join("beta.bin");
    fs::write(&beta, (0u8..=255).collect::<Vec<u8>>()).expect("write beta");
    let pre = temp.path().join("pre.sh");
    fs::write(&pre, "echo unpack-begin\n").expect("write pre");
    let post = temp.path().join("post.sh");
    fs::write(&post, "echo unpack-done\n").expect("write post");
    let archive = temp.path().join("bundle.mshar");

    let create = cmd()
        .args([
            "create",
            "--pre",
            pre.to_str().unwrap(),
            "--post",
            post.to_str().unwrap(),
            "-o",
            archive.to_str().unwrap(),
            alpha.to_str().unwrap(),
            beta.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert!(create.status.success());
    let receipt = parse_json(std::str::from_utf8(&create.stdout).expect("utf8"));
    let created = receipt.get("created").expect("created object");
    assert_eq!(created["entries"].as_u64().unwrap(), 2);
    assert!(created["archive"].as_str().unwrap().ends_with("bundle.mshar"));
    let on_disk = fs::metadata(&archive).expect("metadata").len();
    assert_eq!(created["bytes"].as_u64().unwrap(), on_disk);
    assert!(created["skipped"].as_array().unwrap().is_empty());

    let list = cmd()
        .args(["list", archive.to_str().unwrap(), "--json"])
        .output()
        .expect("list");
    assert!(list.status.success());
    let listing = parse_json(std::str::from_utf8(&list.stdout).expect("utf8"));
    let entries = listing["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"].as_str().unwrap(), "alpha.txt");
    assert_eq!(entries[0]["size"].as_u64().unwrap(), 11);
    assert_eq!(entries[0]["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(entries[1]["name"].as_str().unwrap(), "beta.bin");
    assert_eq!(entries[1]["size"].as_u64().unwrap(), 256);

    let verify = cmd()
        .args(["verify", archive.to_str().unwrap(), "--json"])
        .output()
        .expect("verify");
    assert!(verify.status.success());
    let report = parse_json(std::str::from_utf8(&verify.stdout).expect("utf8"));
    assert_eq!(report["status"].as_str().unwrap(), "ok");
    assert_eq!(report["entries_total"].as_u64().unwrap(), 2);
    assert_eq!(report["issue_count"].as_u64().unwrap(), 0);
}

#[test]
fn create_writes_archive_to_stdout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("alpha.txt");
    fs::write(&input, b"alpha file\n").expect("write");

    let create = cmd()
        .args(["create", input.to_str().unwrap()])
        .output()
        .expect("create");
    assert!(create.status.success());
    let text = std::str::from_utf8(&create.stdout).expect("utf8");
    assert!(text.starts_with("#!/bin/sh\n"));
    assert!(text.contains("#mshar:entry name='alpha.txt' size=11 sha256="));
    assert!(text.contains("#mshar:end entries=1"));
    assert!(text.ends_with("exit 0\n"));

    let saved = temp.path().join("saved.mshar");
    fs::write(&saved, &create.stdout).expect("save");
    let verify = cmd()
        .args(["verify", saved.to_str().unwrap()])
        .output()
        .expect("verify");
    assert!(verify.status.success());
    let human = String::from_utf8_lossy(&verify.stdout);
    assert!(human.starts_with("OK: "));
}

#[cfg(unix)]
#[test]
fn archive_extracts_with_sh() {
    let temp = tempfile::tempdir().expect("tempdir");
    let alpha = temp.path().join("alpha.txt");
    fs::write(&alpha, b"alpha file\n").expect("write alpha");
    let binary = temp.path().join("beta.bin");
    fs::write(&binary, (0u8..=255).collect::<Vec<u8>>()).expect("write binary");
    let empty = temp.path().join("empty.dat");
    fs::write(&empty, b"").expect("write empty");
    let spaced = temp.path().join("with space.txt");
    fs::write(&spaced, b"spaced\n").expect("write spaced");
    let pre = temp.path().join("pre.sh");
    fs::write(&pre, "echo unpack-begin\n").expect("write pre");
    let post = temp.path().join("post.sh");
    fs::write(&post, "echo unpack-done\n").expect("write post");
    let archive = temp.path().join("bundle.mshar");

    let create = cmd()
        .args([
            "create",
            "--pre",
            pre.to_str().unwrap(),
            "--post",
            post.to_str().unwrap(),
            "-o",
            archive.to_str().unwrap(),
            alpha.to_str().unwrap(),
            binary.to_str().unwrap(),
            empty.to_str().unwrap(),
            spaced.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert!(create.status.success());

    let extract_dir = temp.path().join("unpack");
    fs::create_dir(&extract_dir).expect("mkdir");
    let run = Command::new("sh")
        .arg(&archive)
        .current_dir(&extract_dir)
        .output()
        .expect("run archive");
    assert!(
        run.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&run.stderr)
    );

    let stdout = String::from_utf8_lossy(&run.stdout);
    let begin = stdout.find("unpack-begin").expect("prologue ran");
    let first = stdout.find("x - alpha.txt").expect("alpha extracted");
    let done = stdout.find("unpack-done").expect("postscript ran");
    assert!(begin < first && first < done);
    assert!(stdout.contains("x - with space.txt"));

    assert_eq!(
        fs::read(extract_dir.join("alpha.txt")).expect("alpha"),
        b"alpha file\n"
    );
    assert_eq!(
        fs::read(extract_dir.join("beta.bin")).expect("beta"),
        (0u8..=255).collect::<Vec<u8>>()
    );
    assert_eq!(fs::read(extract_dir.join("empty.dat")).expect("empty"), b"");
    assert_eq!(
        fs::read(extract_dir.join("with space.txt")).expect("spaced"),
        b"spaced\n"
    );
}

#[test]
fn empty_file_list_builds_runnable_archive() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = temp.path().join("empty.mshar");

    let create = cmd()
        .args(["create", "-o", archive.to_str().unwrap()])
        .output()
        .expect("create");
    assert!(create.status.success());
    let receipt = parse_json(std::str::from_utf8(&create.stdout).expect("utf8"));
    assert_eq!(receipt["created"]["entries"].as_u64().unwrap(), 0);

    let list = cmd()
        .args(["list", archive.to_str().unwrap(), "--json"])
        .output()
        .expect("list");
    assert!(list.status.success());
    let listing = parse_json(std::str::from_utf8(&list.stdout).expect("utf8"));
    assert!(listing["entries"].as_array().unwrap().is_empty());

    let verify = cmd()
        .args(["verify", archive.to_str().unwrap()])
        .output()
        .expect("verify");
    assert!(verify.status.success());
}

#[test]
fn skip_policy_reports_notices_and_receipt() {
    let temp = tempfile::tempdir().expect("tempdir");
    let absent = temp.path().join("absent.txt");
    let present = temp.path().join("present.txt");
    fs::write(&present, b"here\n").expect("write");
    let archive = temp.path().join("partial.mshar");

    let create = cmd()
        .args([
            "create",
            "--on-error",
            "skip",
            "-o",
            archive.to_str().unwrap(),
            absent.to_str().unwrap(),
            present.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert!(create.status.success());

    let stderr = String::from_utf8_lossy(&create.stderr);
    let mut lines = stderr.lines();
    let skip = parse_json(lines.next().expect("skip notice"));
    assert_eq!(skip["notice"]["kind"].as_str().unwrap(), "input_skip");
    assert_eq!(skip["notice"]["cmd"].as_str().unwrap(), "create");
    assert!(skip["notice"]["details"]["path"]
        .as_str()
        .unwrap()
        .ends_with("absent.txt"));
    let summary = parse_json(lines.next().expect("summary notice"));
    assert_eq!(summary["notice"]["kind"].as_str().unwrap(), "skip_summary");
    assert_eq!(summary["notice"]["details"]["bundled"].as_u64().unwrap(), 1);
    assert_eq!(summary["notice"]["details"]["skipped"].as_u64().unwrap(), 1);

    let receipt = parse_json(std::str::from_utf8(&create.stdout).expect("utf8"));
    let skipped = receipt["created"]["skipped"].as_array().expect("skipped");
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].as_str().unwrap().ends_with("absent.txt"));

    let list = cmd()
        .args(["list", archive.to_str().unwrap(), "--json"])
        .output()
        .expect("list");
    let listing = parse_json(std::str::from_utf8(&list.stdout).expect("utf8"));
    let entries = listing["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"].as_str().unwrap(), "present.txt");
}

#[test]
fn stop_policy_fails_on_missing_input() {
    let temp = tempfile::tempdir().expect("tempdir");
    let absent = temp.path().join("absent.txt");
    let archive = temp.path().join("never.mshar");

    let create = cmd()
        .args([
            "create",
            "-o",
            archive.to_str().unwrap(),
            absent.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert_eq!(create.status.code().unwrap(), 7);
    let error = parse_json_line(&create.stderr);
    assert_eq!(error["error"]["kind"].as_str().unwrap(), "Io");
    assert!(error["error"]["path"]
        .as_str()
        .unwrap()
        .ends_with("absent.txt"));
    assert!(!archive.exists());
}

#[test]
fn duplicate_base_names_are_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir_a = temp.path().join("a");
    let dir_b = temp.path().join("b");
    fs::create_dir_all(&dir_a).expect("mkdir a");
    fs::create_dir_all(&dir_b).expect("mkdir b");
    fs::write(dir_a.join("x.txt"), b"one").expect("write a");
    fs::write(dir_b.join("x.txt"), b"two").expect("write b");

    let create = cmd()
        .args([
            "create",
            dir_a.join("x.txt").to_str().unwrap(),
            dir_b.join("x.txt").to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert_eq!(create.status.code().unwrap(), 2);
    let error = parse_json_line(&create.stderr);
    assert_eq!(error["error"]["kind"].as_str().unwrap(), "Usage");
    assert_eq!(error["error"]["entry"].as_str().unwrap(), "x.txt");
    assert!(create.stdout.is_empty());
}

#[test]
fn existing_output_requires_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("alpha.txt");
    fs::write(&input, b"alpha\n").expect("write");
    let archive = temp.path().join("bundle.mshar");

    let first = cmd()
        .args([
            "create",
            "-o",
            archive.to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert!(first.status.success());

    let refused = cmd()
        .args([
            "create",
            "-o",
            archive.to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .output()
        .expect("create again");
    assert_eq!(refused.status.code().unwrap(), 4);
    let error = parse_json_line(&refused.stderr);
    assert_eq!(error["error"]["kind"].as_str().unwrap(), "AlreadyExists");
    assert!(error["error"]["hint"].as_str().unwrap().contains("--force"));

    let forced = cmd()
        .args([
            "create",
            "--force",
            "-o",
            archive.to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .output()
        .expect("create forced");
    assert!(forced.status.success());
}

#[test]
fn verify_turns_garbage_into_corrupt_exit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let bogus = temp.path().join("bogus.mshar");
    fs::write(&bogus, b"not an archive\n").expect("write");

    let verify = cmd()
        .args(["verify", bogus.to_str().unwrap()])
        .output()
        .expect("verify");
    assert_eq!(verify.status.code().unwrap(), 6);
    let human = String::from_utf8_lossy(&verify.stdout);
    assert!(human.starts_with("CORRUPT: "));

    let as_json = cmd()
        .args(["verify", bogus.to_str().unwrap(), "--json"])
        .output()
        .expect("verify json");
    assert_eq!(as_json.status.code().unwrap(), 6);
    let report = parse_json(std::str::from_utf8(&as_json.stdout).expect("utf8"));
    assert_eq!(report["status"].as_str().unwrap(), "corrupt");
    assert_eq!(report["issues"][0]["code"].as_str().unwrap(), "structure");
}

#[test]
fn verify_detects_tampered_payload() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("hello.txt");
    fs::write(&input, b"hello world!").expect("write");
    let archive = temp.path().join("hello.mshar");

    let create = cmd()
        .args([
            "create",
            "-o",
            archive.to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .output()
        .expect("create");
    assert!(create.status.success());

    // Same length after the edit, so only the digest check trips.
    let text = fs::read_to_string(&archive).expect("read archive");
    let tampered = text.replacen("aGVsbG8gd29ybGQh", "bGVsbG8gd29ybGQh", 1);
    assert_ne!(text, tampered);
    fs::write(&archive, tampered).expect("write tampered");

    let verify = cmd()
        .args(["verify", archive.to_str().unwrap(), "--json"])
        .output()
        .expect("verify");
    assert_eq!(verify.status.code().unwrap(), 6);
    let report = parse_json(std::str::from_utf8(&verify.stdout).expect("utf8"));
    assert_eq!(report["status"].as_str().unwrap(), "corrupt");
    let codes = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["code"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert!(codes.contains(&"digest-mismatch".to_string()));
    assert_eq!(report["issues"][0]["entry"].as_str().unwrap(), "hello.txt");
}

#[test]
fn missing_archive_maps_to_not_found_exit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let absent = temp.path().join("absent.mshar");

    for subcommand in ["list", "verify"] {
        let output = cmd()
            .args([subcommand, absent.to_str().unwrap()])
            .output()
            .expect("run");
        assert_eq!(output.status.code().unwrap(), 3, "subcommand: {subcommand}");
        let error = parse_json_line(&output.stderr);
        assert_eq!(error["error"]["kind"].as_str().unwrap(), "NotFound");
    }
}

#[test]
fn receipt_and_force_flags_require_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("alpha.txt");
    fs::write(&input, b"alpha\n").expect("write");

    let json_flag = cmd()
        .args(["create", "--json", input.to_str().unwrap()])
        .output()
        .expect("create --json");
    assert_eq!(json_flag.status.code().unwrap(), 2);
    let error = parse_json_line(&json_flag.stderr);
    assert_eq!(error["error"]["kind"].as_str().unwrap(), "Usage");
    assert!(error["error"]["message"]
        .as_str()
        .unwrap()
        .contains("--output"));

    let force_flag = cmd()
        .args(["create", "--force", input.to_str().unwrap()])
        .output()
        .expect("create --force");
    assert_eq!(force_flag.status.code().unwrap(), 2);
}

#[test]
fn bare_invocation_exits_with_usage_code() {
    let output = cmd().output().expect("run");
    assert_eq!(output.status.code().unwrap(), 2);
}

#[test]
fn version_reports_json_when_piped() {
    let output = cmd().args(["version"]).output().expect("version");
    assert!(output.status.success());
    let value = parse_json_line(&output.stdout);
    assert_eq!(value["name"].as_str().unwrap(), "mshar");
    assert_eq!(value["version"].as_str().unwrap(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn completion_emits_script() {
    let output = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(output.status.success());
    let script = String::from_utf8_lossy(&output.stdout);
    assert!(script.contains("mshar"));
}
