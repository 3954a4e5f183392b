use crate::env::Environment;
use crate::error::RunError;

/// Runs the shell commands embedded in snippets.
///
/// `input` is fed to the command's stdin and its stdout is returned.
pub trait CommandRunner {
    fn run(&self, command: &str, input: &str, env: &Environment) -> Result<String, RunError>;
}

/// A runner for hosts that do not execute commands. Every command fails,
/// so backtick and pipe output is empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCommands;

impl CommandRunner for NoCommands {
    fn run(&self, command: &str, _input: &str, _env: &Environment) -> Result<String, RunError> {
        Err(RunError::Unavailable {
            command: command.to_owned(),
        })
    }
}

impl<F> CommandRunner for F
where
    F: Fn(&str, &str, &Environment) -> Result<String, RunError>,
{
    fn run(&self, command: &str, input: &str, env: &Environment) -> Result<String, RunError> {
        self(command, input, env)
    }
}
