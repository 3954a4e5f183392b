//! Snippet templates with live tab stops.
//!
//! A template is parsed into [`Node`]s and expanded into a [`TextBuffer`] by
//! a [`SnippetEngine`], which then tracks the tab stops while the user types:
//! mirrors repeat a stop's text, transforms rewrite it through a regex, and
//! pipes run it through a command when the user tabs away. Commands, both
//! pipes and inline `` `shell` `` parts, go through a [`CommandRunner`] so
//! the host decides what may run.

mod buffer;
mod engine;
mod env;
mod error;
mod expand;
mod format;
mod runner;
mod syntax;
mod transform;

pub use buffer::{StringBuffer, TextBuffer};
pub use engine::SnippetEngine;
pub use env::Environment;
pub use error::{RunError, SnippetError};
pub use format::expand_format;
pub use runner::{CommandRunner, NoCommands};
pub use syntax::{parse_template, Node};
pub use transform::Transform;
