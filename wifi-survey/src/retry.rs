use std::{
    io::{BufRead, Write},
    time::Duration,
};

use tracing::warn;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Decides whether a whole round of attempts should be started again after the
/// previous round was exhausted.
pub trait RetryPrompt {
    fn ask_retry(&mut self) -> Result<bool>;
}

/// Asks on a terminal. Only `yes` or `y` (any case) restarts the round.
pub struct StdioPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StdioPrompt<R, W> {
    const QUESTION: &str = "Was not able to successfully get information about access points. Try again? (Yes or No)";

    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> RetryPrompt for StdioPrompt<R, W> {
    fn ask_retry(&mut self) -> Result<bool> {
        write!(self.output, "{}", Self::QUESTION)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            warn!("stdin closed while waiting for retry answer");
            return Ok(false);
        }

        let answer = answer.trim();
        Ok(answer.eq_ignore_ascii_case("yes") || answer.eq_ignore_ascii_case("y"))
    }
}

/// For unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverRetry;

impl RetryPrompt for NeverRetry {
    fn ask_retry(&mut self) -> Result<bool> {
        Ok(false)
    }
}
