use std::io;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SnippetError {
    #[error("Tab stop ${0} is transformed but never defined")]
    UndefinedTabStop(u32),
}

/// Failure reported by a [`CommandRunner`](crate::CommandRunner).
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("No runner available for `{command}`")]
    Unavailable { command: String },

    #[error("`{command}` exited with status {status}")]
    Failed { command: String, status: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
