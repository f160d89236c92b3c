// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::ValueEnum;

use crate::pool::process::KeySpace;

/// Which kind of pool runs the workers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
#[clap(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    /// Default: forked worker processes, System V shared memory and semaphores
    Process,
    /// Worker threads with in-process mailboxes and semaphores
    Thread,
}

/// Everything one run needs, assembled from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub backend: BackendKind,
    pub keys: KeySpace,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("data.txt"),
            output_path: PathBuf::from("results.txt"),
            backend: BackendKind::default(),
            keys: KeySpace::default(),
        }
    }
}
