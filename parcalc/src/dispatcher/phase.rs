// SPDX-License-Identifier: MIT

/// Dispatcher-side view of one worker.
///
/// | phase          | event        | next                  |
/// |----------------|--------------|-----------------------|
/// | `NeverPrimed`  | `Prime`      | `Released { None }`   |
/// | `Released{p}`  | `Prime`      | `Released{p}`         |
/// | `Released{p}`  | `Acquire`    | `Held`                |
/// | `Held`         | `Dispatch(s)`| `Released { Some(s) }`|
/// | `Held`         | `Terminate`  | `Terminated`          |
///
/// Any other combination is a protocol bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `done` has never been posted for this worker.
    NeverPrimed,
    /// The worker owns the mailbox or is idle; `done` tells which. `pending`
    /// is the slot whose result sits uncollected in the mailbox.
    Released { pending: Option<usize> },
    /// The dispatcher consumed `done` and owns the mailbox.
    Held,
    /// `TERMINATE` was sent.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Prime,
    Acquire,
    Dispatch(usize),
    Terminate,
}

impl Phase {
    pub fn next(self, event: Event) -> Option<Phase> {
        match (self, event) {
            (Phase::NeverPrimed, Event::Prime) => Some(Phase::Released { pending: None }),
            (released @ Phase::Released { .. }, Event::Prime) => Some(released),
            (Phase::Released { .. }, Event::Acquire) => Some(Phase::Held),
            (Phase::Held, Event::Dispatch(slot)) => Some(Phase::Released {
                pending: Some(slot),
            }),
            (Phase::Held, Event::Terminate) => Some(Phase::Terminated),
            _ => None,
        }
    }

    pub fn is_primed(&self) -> bool {
        !matches!(self, Phase::NeverPrimed)
    }
}
