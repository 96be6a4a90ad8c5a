use std::{fmt, process::Command, str::FromStr};

use tracing::trace;

use crate::{Result, SurveyError};

/// A program and its arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl FromStr for CommandLine {
    type Err = SurveyError;

    /// Splits on whitespace. Quoting is not supported.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| SurveyError::ConfigError("command cannot be empty".into()))?;

        Ok(Self::new(program, parts))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    /// Stdout followed by stderr, the way a terminal would interleave a tool that
    /// writes diagnostics after its report.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }

    /// Turns a nonzero exit into [`SurveyError::ToolFailed`].
    pub fn ensure_success(self, cmd: &CommandLine) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(SurveyError::ToolFailed {
                command: cmd.to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs. Blocks until the program exits.
pub trait Shell {
    fn exec(&self, cmd: &CommandLine) -> Result<CmdOutput>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Host;

impl Shell for Host {
    fn exec(&self, cmd: &CommandLine) -> Result<CmdOutput> {
        trace!(%cmd, "exec");
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|source| SurveyError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        Ok(CmdOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
