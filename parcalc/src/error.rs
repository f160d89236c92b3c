// SPDX-License-Identifier: MIT

//! Error types for parcalc.
//!
//! Every error is fatal for the run. `main` prints one diagnostic line built
//! from [`CalcError::subsystem`] and the error message, then exits with
//! [`CalcError::exit_code`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalcError {
    /// Bad or missing input.
    #[error("{context}: {message}")]
    Config { context: String, message: String },

    /// Mailbox or semaphore allocation, worker spawn or reap failure.
    #[error("{operation}: {source}")]
    Resource {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Read or write failure on the configuration or results file.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dispatch protocol was violated.
    #[error("{0}")]
    Protocol(String),
}

impl CalcError {
    pub fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        CalcError::Config {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn resource(operation: impl Into<String>, source: impl Into<io::Error>) -> Self {
        CalcError::Resource {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CalcError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn subsystem(&self) -> &'static str {
        match self {
            CalcError::Config { .. } => "config",
            CalcError::Resource { .. } => "resource",
            CalcError::Io { .. } => "io",
            CalcError::Protocol(_) => "protocol",
        }
    }

    /// Configuration problems exit with 2, like argument errors; everything
    /// else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CalcError::Config { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;
