use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AppError, Result};

/// One external command: program, arguments, working directory, extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.cwd = dir.map(Path::to_path_buf);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// `program arg arg ...`, used for logging and the empty-output failure message.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs external commands synchronously.
///
/// Implementations block the calling thread until the child exits. Async callers
/// go through `tokio::task::spawn_blocking`.
pub trait CommandRunner: Send + Sync {
    fn execute(&self, invocation: &Invocation) -> Result<String>;

    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        self.execute(&Invocation::new(program, args.iter().copied()).current_dir(cwd))
    }
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn execute(&self, invocation: &Invocation) -> Result<String> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.envs {
            command.env(key, value);
        }

        tracing::debug!(
            command = %invocation.command_line(),
            cwd = ?invocation.cwd,
            "Running command"
        );

        let output = command.output().map_err(|source| AppError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let combined = combine_output(&output.stdout, &output.stderr);

        if !output.status.success() {
            let exit_code = output.status.code();
            tracing::debug!(
                command = %invocation.command_line(),
                exit_code = ?exit_code,
                "Command failed"
            );
            let output = if combined.is_empty() {
                format!("Command failed: {}", invocation.args.join(" "))
            } else {
                combined
            };
            return Err(AppError::Process { exit_code, output });
        }

        Ok(combined)
    }
}

/// Merge stdout and stderr into one message, trimmed of trailing whitespace.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();

    match (stdout.is_empty(), stderr.is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
