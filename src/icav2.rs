use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

use crate::domain::{FileRecord, ProjectId};
use crate::error::IcaError;

pub trait Workspace {
    fn list(&self, patterns: &[String], project: &ProjectId) -> Result<Vec<FileRecord>, IcaError>;
    fn download(&self, file_id: &str, project: &ProjectId) -> Result<(), IcaError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
    #[serde(default)]
    details: Option<ItemDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

pub fn parse_listing(json: &str) -> Result<Vec<FileRecord>, IcaError> {
    let response: ListResponse =
        serde_json::from_str(json).map_err(|err| IcaError::MalformedResponse(err.to_string()))?;
    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let details = item.details.unwrap_or_default();
            FileRecord {
                id: item.id,
                name: details.name.unwrap_or_default(),
                path: details.path.unwrap_or_default(),
            }
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct Icav2Cli {
    executable: PathBuf,
    target_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Icav2Cli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: anchor_executable(executable.into()),
            target_dir: None,
            timeout: None,
        }
    }

    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run_cmd(
        &self,
        args: &[String],
        cwd: Option<&Path>,
        on_failure: impl Fn(String) -> IcaError,
    ) -> Result<Vec<u8>, IcaError> {
        debug!(program = %self.executable.display(), ?args, "running icav2");
        let mut cmd = Command::new(&self.executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let child = cmd.spawn().map_err(|err| {
            on_failure(format!(
                "failed to launch {}: {err}",
                self.executable.display()
            ))
        })?;

        let output = match self.timeout {
            Some(limit) => wait_with_timeout(child, limit).map_err(|err| match err {
                WaitError::TimedOut => IcaError::Timeout {
                    command: describe(&self.executable, args),
                    seconds: limit.as_secs(),
                },
                WaitError::Io(message) => on_failure(message),
            })?,
            None => child
                .wait_with_output()
                .map_err(|err| on_failure(err.to_string()))?,
        };

        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!(
                "{} exited with {}",
                describe(&self.executable, args),
                output.status
            )
        } else {
            stderr
        };
        Err(on_failure(message))
    }
}

impl Workspace for Icav2Cli {
    fn list(&self, patterns: &[String], project: &ProjectId) -> Result<Vec<FileRecord>, IcaError> {
        let mut args = vec![
            "projectdata".to_string(),
            "list".to_string(),
            "--match-mode".to_string(),
            "FUZZY".to_string(),
            "--project-id".to_string(),
            project.as_str().to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        for pattern in patterns {
            args.push("--file-name".to_string());
            args.push(pattern.clone());
        }
        let stdout = self.run_cmd(&args, None, IcaError::ListingFailed)?;
        let stdout =
            String::from_utf8(stdout).map_err(|err| IcaError::MalformedResponse(err.to_string()))?;
        parse_listing(&stdout)
    }

    fn download(&self, file_id: &str, project: &ProjectId) -> Result<(), IcaError> {
        let args = vec![
            "projectdata".to_string(),
            "download".to_string(),
            file_id.to_string(),
            "--project-id".to_string(),
            project.as_str().to_string(),
        ];
        if let Some(dir) = &self.target_dir {
            fs::create_dir_all(dir)
                .map_err(|err| IcaError::Filesystem(format!("create {}: {err}", dir.display())))?;
        }
        self.run_cmd(&args, self.target_dir.as_deref(), |message| {
            IcaError::DownloadFailed {
                file_id: file_id.to_string(),
                message,
            }
        })?;
        Ok(())
    }
}

enum WaitError {
    TimedOut,
    Io(String),
}

fn wait_with_timeout(mut child: Child, limit: Duration) -> Result<Output, WaitError> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let deadline = Instant::now() + limit;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitError::TimedOut);
            }
            Ok(None) => thread::sleep(Duration::from_millis(50)),
            Err(err) => return Err(WaitError::Io(err.to_string())),
        }
    };

    let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
        handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    };
    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn describe(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(args.iter().take(2).cloned());
    parts.join(" ")
}

// Paths with a directory part resolve against the launch directory, not the
// download directory. Bare names keep the PATH lookup.
fn anchor_executable(executable: PathBuf) -> PathBuf {
    if executable.is_absolute() || executable.components().count() < 2 {
        return executable;
    }
    std::path::absolute(&executable).unwrap_or(executable)
}

pub fn default_executable() -> PathBuf {
    let name = if cfg!(windows) { "icav2.exe" } else { "icav2" };
    find_in_path(name).unwrap_or_else(|| PathBuf::from(name))
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_listing_items() {
        let json = r#"{
            "items": [
                {"id": "fil.a", "details": {"name": "s1.bam", "path": "RUN1/s1.bam", "fileSizeInBytes": 10}},
                {"id": "fil.b", "details": {"name": "s2.vcf.gz"}},
                {"id": "fil.c"}
            ],
            "nextPageToken": null
        }"#;
        let records = parse_listing(json).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], FileRecord::new("fil.a", "s1.bam", "RUN1/s1.bam"));
        assert_eq!(records[1].path, "");
        assert_eq!(records[2].name, "");
    }

    #[test]
    fn parse_listing_without_items_is_empty() {
        assert!(parse_listing("{}").unwrap().is_empty());
    }

    #[test]
    fn parse_listing_rejects_garbage() {
        assert_matches!(
            parse_listing("Error: not logged in"),
            Err(IcaError::MalformedResponse(_))
        );
    }

    #[test]
    fn relative_executable_is_anchored() {
        let cli = Icav2Cli::new("tools/icav2");
        assert!(cli.executable().is_absolute());
        assert!(cli.executable().ends_with("tools/icav2"));

        let cli = Icav2Cli::new("icav2");
        assert_eq!(cli.executable(), Path::new("icav2"));
    }

    #[test]
    fn missing_executable_is_listing_failure() {
        let cli = Icav2Cli::new("/nonexistent/icav2-binary");
        let project: ProjectId = "proj".parse().unwrap();
        let err = cli.list(&["x".to_string()], &project).unwrap_err();
        assert_matches!(err, IcaError::ListingFailed(_));
    }
}
