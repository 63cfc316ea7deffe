#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    /// Parse the last stdout line as a JSON payload.
    pub fn json(&self) -> serde_json::Value {
        let line = self
            .stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_else(|| panic!("no stdout; log: {}", self.log_path.display()));
        serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("invalid JSON ({e}); log: {}", self.log_path.display()))
    }
}

/// Environment variables that would leak the caller's settings into a case.
const PAIRDIFF_ENV: [&str; 8] = [
    "PAIRDIFF_SOURCE_DIRECTORY",
    "PAIRDIFF_TARGET_DIRECTORY",
    "PAIRDIFF_IGNORE_METADATA_FILES",
    "PAIRDIFF_METADATA_EXTENSION",
    "PAIRDIFF_EXPIRES",
    "PAIRDIFF_COMPARATOR",
    "PAIRDIFF_LOG_FILE",
    "PAIRDIFF_OUTPUT_FORMAT",
];

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_pairdiff") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "pairdiff.exe"
    } else {
        "pairdiff"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve pairdiff binary path for integration test"),
    }
}

/// Run the binary from a scratch working directory with a clean environment.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let cwd = tempfile::tempdir().expect("create scratch cwd");
    run_cli_case_in(case_name, cwd.path(), args, &[])
}

/// Run the binary in `cwd` with extra environment variables.
pub fn run_cli_case_in(
    case_name: &str,
    cwd: &Path,
    args: &[&str],
    envs: &[(&str, &str)],
) -> CmdResult {
    let root = std::env::temp_dir().join("pairdiff-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).current_dir(cwd).env("RUST_BACKTRACE", "1");
    for key in PAIRDIFF_ENV {
        command.env_remove(key);
    }
    for (key, value) in envs {
        command.env(key, value);
    }
    let output = command.output().expect("execute pairdiff command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("cwd={}\n", cwd.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("envs={envs:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Create `rel` under `root` (and its parents) with the relative path as content.
pub fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, rel).expect("write fixture file");
    path
}
