#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_matches::assert_matches;

use icav2_fetch::domain::{FileRecord, ProjectId};
use icav2_fetch::error::IcaError;
use icav2_fetch::icav2::{Icav2Cli, Workspace};

const FAKE_ICAV2: &str = r#"#!/bin/sh
case "$2" in
  list)
    if [ "$6" = "binary" ]; then
      printf '\377\376'
      exit 0
    fi
    if [ "$6" = "denied" ]; then
      echo "project not accessible" >&2
      exit 3
    fi
    cat <<'EOF'
{"items": [
  {"id": "fil.1", "details": {"name": "s1.bam", "path": "RUN7/s1.bam"}},
  {"id": "fil.2", "details": {"name": "s1.vcf.gz", "path": "RUN7/s1.vcf.gz"}}
]}
EOF
    ;;
  download)
    if [ "$3" = "fil.bad" ]; then
      echo "file not found" >&2
      exit 1
    fi
    if [ "$3" = "fil.slow" ]; then
      sleep 5
    fi
    touch "$3"
    ;;
esac
"#;

fn fake_icav2(dir: &Path) -> PathBuf {
    let path = dir.join("icav2");
    fs::write(&path, FAKE_ICAV2).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn project(value: &str) -> ProjectId {
    value.parse().unwrap()
}

#[test]
fn list_decodes_collaborator_output() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path()));

    let records = cli.list(&["s1".to_string()], &project("p1")).unwrap();

    assert_eq!(
        records,
        vec![
            FileRecord::new("fil.1", "s1.bam", "RUN7/s1.bam"),
            FileRecord::new("fil.2", "s1.vcf.gz", "RUN7/s1.vcf.gz"),
        ]
    );
}

#[test]
fn list_failure_carries_stderr() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path()));

    let err = cli.list(&["s1".to_string()], &project("denied")).unwrap_err();

    assert_matches!(err, IcaError::ListingFailed(message) if message == "project not accessible");
}

#[test]
fn download_runs_in_target_dir() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("out");
    fs::create_dir_all(&target).unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path())).with_target_dir(&target);

    cli.download("fil.1", &project("p1")).unwrap();

    assert!(target.join("fil.1").exists());
}

#[test]
fn download_failure_carries_stderr() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path())).with_target_dir(temp.path());

    let err = cli.download("fil.bad", &project("p1")).unwrap_err();

    assert_matches!(
        err,
        IcaError::DownloadFailed { file_id, message } if file_id == "fil.bad" && message == "file not found"
    );
}

#[test]
fn slow_call_is_killed_after_timeout() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path()))
        .with_target_dir(temp.path())
        .with_timeout(Some(Duration::from_secs(1)));

    let err = cli.download("fil.slow", &project("p1")).unwrap_err();

    assert_matches!(err, IcaError::Timeout { seconds: 1, .. });
    assert!(!temp.path().join("fil.slow").exists());
}

#[test]
fn list_rejects_non_utf8_output() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(fake_icav2(temp.path()));

    let err = cli.list(&["s1".to_string()], &project("binary")).unwrap_err();

    assert_matches!(err, IcaError::MalformedResponse(_));
}

#[test]
fn relative_executable_survives_target_dir() {
    let tools = tempfile::Builder::new()
        .prefix("icav2-tools")
        .tempdir_in(".")
        .unwrap();
    fake_icav2(tools.path());
    let relative = PathBuf::from(tools.path().file_name().unwrap()).join("icav2");
    let target = tempfile::tempdir().unwrap();
    let cli = Icav2Cli::new(&relative).with_target_dir(target.path());

    assert!(cli.executable().is_absolute());
    cli.download("fil.1", &project("p1")).unwrap();

    assert!(target.path().join("fil.1").exists());
}

#[test]
fn target_dir_is_created_on_first_download() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("nested").join("out");
    let cli = Icav2Cli::new(fake_icav2(temp.path())).with_target_dir(&target);

    cli.list(&["s1".to_string()], &project("p1")).unwrap();
    assert!(!target.exists());

    cli.download("fil.1", &project("p1")).unwrap();
    assert!(target.join("fil.1").exists());
}
