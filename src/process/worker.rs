//! Worker command - how the supervised process is launched.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::{Result, SupervisorError};

/// Command line and environment for the worker process
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the worker
    pub cwd: PathBuf,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Variable set to `1` so the worker knows it is supervised
    pub supervised_env: Option<String>,
}

impl WorkerCommand {
    /// Create a new worker command running `program` in the current directory
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            env: Vec::new(),
            supervised_env: None,
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = cwd.as_ref().to_path_buf();
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the supervision marker variable
    pub fn supervised_env(mut self, key: impl Into<String>) -> Self {
        self.supervised_env = Some(key.into());
        self
    }

    /// Render the command line for logs
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Spawn the worker.
    ///
    /// Stdio is inherited. The child is killed if its handle is dropped
    /// without being reaped.
    pub fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(key) = &self.supervised_env {
            cmd.env(key, "1");
        }

        cmd.spawn()
            .map_err(|e| SupervisorError::Spawn(format!("{}: {}", self.display(), e)))
    }
}
