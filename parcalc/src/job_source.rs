// SPDX-License-Identifier: MIT

//! Reading the configuration file into a worker count and a job sequence.
//!
//! ```text
//! 2          <- number of workers
//! 1 3+4      <- <worker id> <operand1><opcode><operand2>
//! 0 -2*-9    <- id 0: any idle worker
//! ```

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{CalcError, Result};
use crate::job::{Job, Opcode, Target};

/// Upper bound on the pool size. `ftok` keeps only 8 bits of the project id
/// used to derive per-worker keys.
pub const MAX_WORKERS: usize = 255;

/// Everything the dispatcher needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPlan {
    pub n_proc: usize,
    pub jobs: Vec<Job>,
}

/// Reads and parses `path`. `Ok(None)` means the file has no content at all.
pub fn read_plan(path: &Path) -> Result<Option<JobPlan>> {
    let text = fs::read_to_string(path).map_err(|e| CalcError::io(path, e))?;
    parse_plan(&text, &path.display().to_string())
}

/// Parses configuration text. `origin` names the input in error messages.
pub fn parse_plan(text: &str, origin: &str) -> Result<Option<JobPlan>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let Some((line_no, header)) = lines.next() else {
        return Ok(None);
    };
    let n_proc = parse_worker_count(header)
        .map_err(|message| CalcError::config(format!("{origin} line {line_no}"), message))?;

    let mut jobs = Vec::new();
    for (line_no, line) in lines {
        let job = parse_job(line, jobs.len(), n_proc)
            .map_err(|message| CalcError::config(format!("{origin} line {line_no}"), message))?;
        jobs.push(job);
    }
    debug!("parsed {} jobs for {} workers from {}", jobs.len(), n_proc, origin);

    Ok(Some(JobPlan { n_proc, jobs }))
}

fn parse_worker_count(line: &str) -> std::result::Result<usize, String> {
    let n_proc: usize = line
        .parse()
        .map_err(|_| format!("invalid number of workers {line:?}"))?;
    if n_proc == 0 || n_proc > MAX_WORKERS {
        return Err(format!(
            "number of workers must be between 1 and {MAX_WORKERS}, got {n_proc}"
        ));
    }
    Ok(n_proc)
}

/// Parses `<id> <expression>`.
///
/// The opcode is the first `+ - * /` after the first character of the
/// expression, so operand1 may carry a sign. Everything after the opcode is
/// operand2, which may carry one sign of its own (`5--3` is `5 - (-3)`).
fn parse_job(
    line: &str,
    sequence_index: usize,
    n_proc: usize,
) -> std::result::Result<Job, String> {
    let (id, expression) = line
        .split_once(' ')
        .ok_or_else(|| format!("missing separator between worker id and operation in {line:?}"))?;

    let id: i64 = id
        .parse()
        .map_err(|_| format!("invalid worker id {id:?}"))?;
    if id < 0 || id > n_proc as i64 {
        return Err(format!("worker id {id} out of range (0..={n_proc})"));
    }

    let expression = expression.trim();
    let (pos, opcode) = expression
        .bytes()
        .enumerate()
        .skip(1)
        .find_map(|(i, b)| Opcode::from_byte(b).map(|op| (i, op)))
        .ok_or_else(|| format!("found an incorrect operation {expression:?}"))?;

    let operand1 = parse_operand(&expression[..pos])?;
    let operand2 = parse_operand(&expression[pos + 1..])?;

    Ok(Job {
        sequence_index,
        target: Target::from_id(id as usize),
        opcode,
        operand1,
        operand2,
    })
}

fn parse_operand(text: &str) -> std::result::Result<f64, String> {
    let text = text.trim();
    text.parse()
        .map_err(|_| format!("invalid operand {text:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(text: &str) -> JobPlan {
        parse_plan(text, "test").unwrap().unwrap()
    }

    fn config_message(text: &str) -> String {
        match parse_plan(text, "test") {
            Err(CalcError::Config { context, message }) => format!("{context}: {message}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn parses_header_and_jobs() {
        let plan = plan("2\n1 3+4\n2 10/2\n1 5*6\n");
        assert_eq!(plan.n_proc, 2);
        assert_eq!(plan.jobs.len(), 3);
        assert_eq!(
            plan.jobs[1],
            Job {
                sequence_index: 1,
                target: Target::Worker(2),
                opcode: Opcode::Div,
                operand1: 10.0,
                operand2: 2.0,
            }
        );
        assert_eq!(plan.jobs[2].target, Target::Worker(1));
    }

    #[test]
    fn id_zero_means_any_worker() {
        let plan = plan("1\n0 2-9\n");
        assert_eq!(plan.jobs[0].target, Target::AnyWorker);
        assert_eq!(plan.jobs[0].opcode, Opcode::Sub);
        assert_eq!(plan.jobs[0].expected(), -7.0);
    }

    #[test]
    fn leading_sign_on_first_operand() {
        let job = plan("1\n1 -3*2\n").jobs[0];
        assert_eq!(job.opcode, Opcode::Mul);
        assert_eq!(job.operand1, -3.0);
        assert_eq!(job.operand2, 2.0);

        let job = plan("1\n1 +3-2\n").jobs[0];
        assert_eq!(job.opcode, Opcode::Sub);
        assert_eq!(job.operand1, 3.0);
    }

    #[test]
    fn signed_second_operand() {
        assert_eq!(plan("1\n1 5--3\n").jobs[0].expected(), 8.0);
        assert_eq!(plan("1\n1 5*-2\n").jobs[0].expected(), -10.0);
        assert_eq!(plan("1\n1 5-+3\n").jobs[0].expected(), 2.0);
        assert_eq!(plan("1\n1 -5/-5\n").jobs[0].expected(), 1.0);
    }

    #[test]
    fn exponent_with_sign_is_not_an_operand() {
        // The '-' inside the exponent is taken as the opcode.
        let msg = config_message("1\n1 1e-3+2\n");
        assert!(msg.contains("invalid operand \"1e\""), "{msg}");
    }

    #[test]
    fn blank_lines_and_crlf_are_skipped() {
        let plan = plan("\r\n2\r\n\r\n1 1.5+1.5\r\n   \n2 4/8\r\n");
        assert_eq!(plan.n_proc, 2);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[0].expected(), 3.0);
        assert_eq!(plan.jobs[1].sequence_index, 1);
        assert_eq!(plan.jobs[1].expected(), 0.5);
    }

    #[test]
    fn spaces_around_the_opcode_are_allowed() {
        let job = plan("1\n1 3 + 4\n").jobs[0];
        assert_eq!(job.expected(), 7.0);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert_eq!(parse_plan("", "test").unwrap(), None);
        assert_eq!(parse_plan("\n\n  \n", "test").unwrap(), None);
    }

    #[test]
    fn header_without_jobs() {
        let plan = plan("3\n");
        assert_eq!(plan.n_proc, 3);
        assert!(plan.jobs.is_empty());
    }

    #[test]
    fn invalid_worker_counts() {
        assert!(config_message("0\n").contains("between 1 and 255"));
        assert!(config_message("256\n").contains("between 1 and 255"));
        assert!(config_message("two\n").contains("invalid number of workers"));
    }

    #[test]
    fn out_of_range_ids() {
        assert_eq!(
            config_message("2\n1 1+1\n3 1+1\n"),
            "test line 3: worker id 3 out of range (0..=2)"
        );
        assert!(config_message("2\n-1 1+1\n").contains("worker id -1 out of range"));
    }

    #[test]
    fn malformed_lines() {
        assert!(config_message("1\n13+4\n").contains("missing separator"));
        assert!(config_message("1\nx 3+4\n").contains("invalid worker id"));
        assert!(config_message("1\n1 34\n").contains("incorrect operation"));
        assert!(config_message("1\n1 -34\n").contains("incorrect operation"));
        assert!(config_message("1\n1 3+\n").contains("invalid operand \"\""));
        assert!(config_message("1\n1 a+4\n").contains("invalid operand \"a\""));
    }

    #[test]
    fn line_numbers_count_blank_lines() {
        let msg = config_message("1\n\n1 1+1\n\n1 oops\n");
        assert!(msg.starts_with("test line 5:"), "{msg}");
    }

    #[test]
    fn read_plan_reports_missing_file() {
        let err = read_plan(Path::new("/nonexistent/parcalc/data.txt")).unwrap_err();
        assert_eq!(err.subsystem(), "io");
    }
}
