//! Job variants shipped with the crate.

pub mod shell;

pub use self::shell::{SHELL_JOB, ShellJob};
