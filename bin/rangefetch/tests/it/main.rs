//! Runs the rangefetch binary against objects on the local file-system.

#![allow(missing_docs)]

use rangefetch_downloader::{partition_file_name, plan, test_utils::sample_content};
use std::{
    path::Path,
    process::{Command, Output},
};
use tempfile::TempDir;
use url::Url;

const CONTAINER: &str = "videos";
const KEY: &str = "diving/short-film.mp4";

/// A store directory holding one object, and an empty output directory.
struct Fixture {
    store: TempDir,
    output: TempDir,
    content: Vec<u8>,
}

impl Fixture {
    fn new(len: usize) -> Self {
        let store = tempfile::tempdir().unwrap();
        let content = sample_content(len);
        let path = store.path().join(CONTAINER).join(KEY);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, &content).unwrap();
        Self { store, output: tempfile::tempdir().unwrap(), content }
    }

    fn endpoint(&self) -> String {
        Url::from_directory_path(self.store.path()).unwrap().to_string()
    }

    fn fetch(&self, key: &str, extra: &[&str]) -> Output {
        self.fetch_into(self.output.path(), key, extra).output().unwrap()
    }

    /// The `fetch` invocation for `key` writing into `output`, logging disabled.
    fn fetch_into(&self, output: &Path, key: &str, extra: &[&str]) -> Command {
        let endpoint = self.endpoint();
        let output = output.to_str().unwrap();
        let mut args = vec![
            "fetch",
            "--endpoint",
            &endpoint,
            "--container",
            CONTAINER,
            "--key",
            key,
            "--output",
            output,
            "--retries",
            "0",
        ];
        args.extend_from_slice(extra);
        command(&args)
    }
}

fn command(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rangefetch"));
    command.args(args).env("RUST_LOG", "off").env_remove("RANGEFETCH_ENDPOINT");
    command
}

fn rangefetch(args: &[&str]) -> Output {
    command(args).output().unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn test_help() {
    let output = rangefetch(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("fetch"));
    assert!(stdout.contains("plan"));
}

#[test]
fn test_plan_prints_partitions() {
    let output = rangefetch(&["plan", "--size", "1000", "--workers", "3"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0\t0-333\t334\tpart-"));
    assert!(lines[2].starts_with("2\t666-999\t334\tpart-"));
}

#[test]
fn test_plan_rejects_empty_object() {
    let output = rangefetch(&["plan", "--size", "0"]);
    assert!(!output.status.success());
}

#[test]
fn test_fetch_writes_every_partition() {
    let fixture = Fixture::new(1000);

    let output = fixture.fetch(KEY, &["--workers", "3"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let partitions = plan(1000, 3).unwrap();
    let expected = partitions.iter().map(partition_file_name).collect::<Vec<_>>();
    assert_eq!(files_in(fixture.output.path()), expected);

    for partition in &partitions {
        let bytes = std::fs::read(fixture.output.path().join(partition_file_name(partition)));
        let start = partition.range.start() as usize;
        let end = partition.range.end() as usize;
        assert_eq!(bytes.unwrap(), &fixture.content[start..=end]);
    }

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().filter(|line| line.contains("\tok\t")).count(), 3);
}

#[test]
fn test_fetch_missing_object_fails() {
    let fixture = Fixture::new(100);

    let output = fixture.fetch("diving/missing.mp4", &[]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
    assert!(files_in(fixture.output.path()).is_empty());
}

#[test]
fn test_fetch_selected_partitions() {
    let fixture = Fixture::new(400);

    let output = fixture.fetch(KEY, &["--workers", "4", "--partitions", "1,3"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let partitions = plan(400, 4).unwrap();
    let expected =
        [partitions[1], partitions[3]].iter().map(partition_file_name).collect::<Vec<_>>();
    assert_eq!(files_in(fixture.output.path()), expected);
}

#[test]
fn test_fetch_unknown_partition_index() {
    let fixture = Fixture::new(400);

    let output = fixture.fetch(KEY, &["--workers", "4", "--partitions", "7"]);

    assert!(!output.status.success());
    assert!(files_in(fixture.output.path()).is_empty());
}

#[test]
fn test_fetch_partial_failure_reports_every_partition() {
    let fixture = Fixture::new(300);
    let occupied = fixture.output.path().join("occupied");
    std::fs::write(&occupied, b"not a directory").unwrap();

    let output = fixture.fetch_into(&occupied, KEY, &["--workers", "3"]).output().unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let failed = stdout.lines().filter(|line| line.contains("\tfailed\t")).collect::<Vec<_>>();
    assert_eq!(failed.len(), 3, "{stdout}");
    for (index, line) in failed.iter().enumerate() {
        assert!(line.starts_with(&format!("{index}\t")), "{line}");
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("3 of 3 partitions failed"), "{stderr}");
    assert!(stderr.contains("--partitions 0,1,2"), "{stderr}");
}

#[test]
fn test_fetch_report_is_not_mixed_with_logs() {
    let fixture = Fixture::new(1000);

    // default verbosity, no log filter override
    let output = fixture
        .fetch_into(fixture.output.path(), KEY, &["--workers", "3"])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3, "{stdout}");
    for (index, line) in lines.iter().enumerate() {
        assert!(line.starts_with(&format!("{index}\t")), "{line}");
        assert!(line.contains("\tok\t"), "{line}");
    }
}
