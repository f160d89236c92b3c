// SPDX-License-Identifier: MIT

use log::{debug, info};

use super::{Mailbox, Signals, SyncPair};
use crate::error::{CalcError, Result};
use crate::job::Opcode;

/// The compute loop of worker `index` (0-based).
///
/// Waits on `ready`, computes the job in the mailbox, stores the result and
/// posts `done`, until it reads `TERMINATE`. `TERMINATE` is not answered.
/// Returns the number of jobs computed.
pub fn run_worker<M, S>(index: usize, mailbox: &M, signals: &S, pair: SyncPair) -> Result<usize>
where
    M: Mailbox + ?Sized,
    S: Signals + ?Sized,
{
    let id = index + 1;
    let mut computed = 0;
    loop {
        pair.wait_ready(signals)?;

        let mut record = mailbox.load();
        if record.is_terminate() {
            info!("worker {} terminated after {} jobs", id, computed);
            return Ok(computed);
        }
        let opcode = Opcode::from_byte(record.opcode).ok_or_else(|| {
            CalcError::Protocol(format!(
                "worker {} found unknown opcode {:#04x} in its mailbox",
                id, record.opcode
            ))
        })?;

        record.result = opcode.apply(record.operand1, record.operand2);
        debug!(
            "worker {}: {} {} {} = {}",
            id, record.operand1, opcode, record.operand2, record.result
        );
        mailbox.store(record);
        computed += 1;

        pair.signal_done(signals)?;
    }
}
