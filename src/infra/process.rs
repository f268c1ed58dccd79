//! External command execution
//!
//! Every pipeline stage drives host tools (parted, cgpt, futility, tar, ...)
//! through this module. Call sites pick a failure policy explicitly:
//! [`Cmd::run`] treats a non-zero exit as fatal, [`Cmd::run_check`] hands the
//! result back for inspection, and [`Cmd::run_best_effort`] suppresses
//! failures entirely (idempotent teardown).

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CmdOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CmdOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, or -1 when terminated by a signal.
    pub fn code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }

    /// Captured stdout, trimmed of surrounding whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Captured stderr, trimmed of surrounding whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for a single external command invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    current_dir: Option<PathBuf>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            current_dir: None,
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a path as an argument.
    #[must_use]
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Feed the given bytes to the command's stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Spawn the command and collect its output. Fails only if the command
    /// could not be spawned; the exit status is left to the caller.
    pub fn run_check(self) -> Result<CmdOutput> {
        let description = self.describe();
        tracing::debug!("running: {description}");

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        if self.stdin.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn: {description}"))?;

        if let Some(input) = &self.stdin {
            // The child may exit before reading everything; a broken pipe
            // here surfaces as the command's own exit status instead.
            if let Some(mut handle) = child.stdin.take() {
                let _ = handle.write_all(input.as_bytes());
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for: {description}"))?;

        Ok(CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the command, failing on spawn errors and non-zero exits.
    pub fn run(self) -> Result<CmdOutput> {
        let description = self.describe();
        let output = self.run_check()?;
        if !output.success() {
            bail!(
                "Command failed ({}): {}\n{}",
                output.code(),
                description,
                output.stderr_trimmed()
            );
        }
        Ok(output)
    }

    /// Run the command and return its trimmed stdout.
    pub fn run_capture(self) -> Result<String> {
        Ok(self.run()?.stdout_trimmed().to_string())
    }

    /// Run the command, suppressing every failure. Returns whether the
    /// command ran and exited successfully.
    pub fn run_best_effort(self) -> bool {
        let description = self.describe();
        match self.run_check() {
            Ok(output) if output.success() => true,
            Ok(output) => {
                tracing::debug!(
                    "ignoring failure ({}): {}: {}",
                    output.code(),
                    description,
                    output.stderr_trimmed()
                );
                false
            }
            Err(e) => {
                tracing::debug!("ignoring spawn failure: {description}: {e:#}");
                false
            }
        }
    }
}

/// Build a command that runs `command` through `/bin/sh -c` inside a chroot
/// rooted at `root`.
pub fn chroot_cmd(root: &Path, command: &str) -> Cmd {
    Cmd::new("chroot")
        .arg_path(root)
        .args(["/bin/sh", "-c"])
        .arg(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_capture_trims_stdout() {
        let out = Cmd::new("echo").arg("hello").run_capture().unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let result = Cmd::new("false").run();
        assert!(result.is_err());
    }

    #[test]
    fn test_run_check_reports_exit_code() {
        let out = Cmd::new("sh").args(["-c", "exit 3"]).run_check().unwrap();
        assert!(!out.success());
        assert_eq!(out.code(), 3);
    }

    #[test]
    fn test_run_best_effort_suppresses_failures() {
        assert!(!Cmd::new("false").run_best_effort());
        assert!(!Cmd::new("/nonexistent-program").run_best_effort());
        assert!(Cmd::new("true").run_best_effort());
    }

    #[test]
    fn test_stdin_is_forwarded() {
        let out = Cmd::new("cat").stdin("piped input").run().unwrap();
        assert_eq!(out.stdout_trimmed(), "piped input");
    }

    #[test]
    fn test_chroot_cmd_shape() {
        let cmd = chroot_cmd(Path::new("/mnt/test"), "id -u");
        assert_eq!(
            cmd.describe(),
            "chroot /mnt/test /bin/sh -c id -u"
        );
    }
}
