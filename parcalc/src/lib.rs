// SPDX-License-Identifier: MIT
// parcalc: skeleton of a parallel calculator
//
// - A dispatcher reads jobs from a configuration file.
// - Each job goes to a worker through a shared mailbox and a pair of semaphores.
// - Results are collected lazily and written in input order.

use log::info;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod job_source;
pub mod pool;
pub mod result_sink;

use crate::config::{BackendKind, RunConfig};
use crate::error::Result;
use crate::pool::process::ProcessBackend;
use crate::pool::thread::ThreadBackend;

/// Reads the plan, runs it on the configured backend and writes the results.
///
/// Returns the number of results written, or `None` when the configuration
/// file is empty and nothing was done.
pub fn execute(config: &RunConfig) -> Result<Option<usize>> {
    let Some(plan) = job_source::read_plan(&config.config_path)? else {
        info!(
            "{} is empty, nothing to do",
            config.config_path.display()
        );
        return Ok(None);
    };

    let results = match config.backend {
        BackendKind::Process => {
            dispatcher::run(ProcessBackend::new(config.keys.clone()), &plan)?
        }
        BackendKind::Thread => dispatcher::run(ThreadBackend::new(), &plan)?,
    };

    result_sink::write_results(&config.output_path, &results)?;
    info!(
        "wrote {} results to {}",
        results.len(),
        config.output_path.display()
    );
    Ok(Some(results.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_in(dir: &std::path::Path, backend: BackendKind) -> RunConfig {
        RunConfig {
            config_path: dir.join("data.txt"),
            output_path: dir.join("results.txt"),
            backend,
            ..RunConfig::default()
        }
    }

    #[test]
    fn execute_writes_results_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Thread);
        fs::write(&config.config_path, "2\n1 3+4\n2 10/2\n1 5*6\n").unwrap();

        assert_eq!(execute(&config).unwrap(), Some(3));
        assert_eq!(
            fs::read_to_string(&config.output_path).unwrap(),
            "7.000000\n5.000000\n30.000000\n"
        );
    }

    #[test]
    fn empty_configuration_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Process);
        fs::write(&config.config_path, "").unwrap();

        assert_eq!(execute(&config).unwrap(), None);
        assert!(!config.output_path.exists());
    }

    #[test]
    fn config_error_leaves_no_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Process);
        fs::write(&config.config_path, "2\n1 1+1\n3 2+2\n").unwrap();

        let err = execute(&config).unwrap_err();
        assert_eq!(err.subsystem(), "config");
        assert!(!config.output_path.exists());
    }

    #[test]
    fn file_derived_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("parcalc.key");
        fs::write(&key_file, "").unwrap();
        let config = RunConfig {
            keys: pool::process::KeySpace::File(key_file),
            ..config_in(dir.path(), BackendKind::Process)
        };
        fs::write(&config.config_path, "2\n0 1+1\n0 2+2\n2 3+3\n").unwrap();

        assert_eq!(execute(&config).unwrap(), Some(3));
        assert_eq!(
            fs::read_to_string(&config.output_path).unwrap(),
            "2.000000\n4.000000\n6.000000\n"
        );
    }
}
