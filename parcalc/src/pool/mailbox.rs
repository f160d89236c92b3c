// SPDX-License-Identifier: MIT

use crate::job::{Job, TERMINATE};

/// Layout of a mailbox, shared verbatim between dispatcher and worker.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MailboxRecord {
    /// `+ - * /`, or [`TERMINATE`].
    pub opcode: u8,
    pub operand1: f64,
    pub operand2: f64,
    pub result: f64,
}

impl MailboxRecord {
    /// Replaces the job fields and keeps the last result.
    pub fn with_job(self, job: &Job) -> MailboxRecord {
        MailboxRecord {
            opcode: job.opcode.as_byte(),
            operand1: job.operand1,
            operand2: job.operand2,
            ..self
        }
    }

    pub fn with_terminate(self) -> MailboxRecord {
        MailboxRecord {
            opcode: TERMINATE,
            ..self
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.opcode == TERMINATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Opcode, Target};

    #[test]
    fn writing_a_job_keeps_result() {
        let rec = MailboxRecord {
            result: 7.0,
            ..Default::default()
        };
        let job = Job {
            sequence_index: 4,
            target: Target::AnyWorker,
            opcode: Opcode::Mul,
            operand1: 5.0,
            operand2: 6.0,
        };
        let rec = rec.with_job(&job);
        assert_eq!(rec.opcode, b'*');
        assert_eq!(rec.operand1, 5.0);
        assert_eq!(rec.operand2, 6.0);
        assert_eq!(rec.result, 7.0);
        assert!(!rec.is_terminate());
        assert!(rec.with_terminate().is_terminate());
    }
}
