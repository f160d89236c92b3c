// SPDX-License-Identifier: MIT
// parcalc: skeleton of a parallel calculator
//
// - Reads the number of workers and the jobs from a configuration file.
// - Forks the workers and feeds them through System V shared memory and semaphores.
// - Writes one result per job, in input order.

use std::path::PathBuf;

use clap::Parser;
use log::debug;

use parcalc::config::{BackendKind, RunConfig};
use parcalc::pool::process::KeySpace;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Configuration file: number of workers, then one `<id> <a><op><b>` per line
    #[arg(long, value_name = "PATH", default_value = "data.txt")]
    config: PathBuf,

    /// Results file, one value per job
    #[arg(long, value_name = "PATH", default_value = "results.txt")]
    output: PathBuf,

    /// Kind of worker pool
    #[arg(long, value_enum, default_value_t)]
    backend: BackendKind,

    #[arg(
        long = "ipc-key-file",
        value_name = "PATH",
        help = "Derive System V IPC keys from this file with ftok instead of using private keys",
        long_help = "Derive System V IPC keys from this existing file with ftok(3): mailbox N uses\n\
                 project id N, the semaphore set uses 'a'. Objects are created exclusively, so\n\
                 leftovers of a crashed run are reported as key collisions. Process backend only."
    )]
    ipc_key_file: Option<PathBuf>,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.ipc_key_file.is_some() && args.backend != BackendKind::Process {
        return Err("--ipc-key-file may only be used with --backend process".into());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }
    debug!("{:?}", args);

    let config = RunConfig {
        config_path: args.config,
        output_path: args.output,
        backend: args.backend,
        keys: match args.ipc_key_file {
            Some(path) => KeySpace::File(path),
            None => KeySpace::Private,
        },
    };

    if let Err(e) = parcalc::execute(&config) {
        eprintln!("Error in {} - {}", e.subsystem(), e);
        std::process::exit(e.exit_code());
    }
}
