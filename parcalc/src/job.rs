// SPDX-License-Identifier: MIT

/// Mailbox opcode telling a worker to exit. Not an arithmetic operation.
pub const TERMINATE: u8 = b'K';

/// Arithmetic operation carried by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte {
            b'+' => Some(Opcode::Add),
            b'-' => Some(Opcode::Sub),
            b'*' => Some(Opcode::Mul),
            b'/' => Some(Opcode::Div),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Opcode::Add => b'+',
            Opcode::Sub => b'-',
            Opcode::Mul => b'*',
            Opcode::Div => b'/',
        }
    }

    /// Plain IEEE arithmetic. Division by zero yields infinity or NaN.
    pub fn apply(self, operand1: f64, operand2: f64) -> f64 {
        match self {
            Opcode::Add => operand1 + operand2,
            Opcode::Sub => operand1 - operand2,
            Opcode::Mul => operand1 * operand2,
            Opcode::Div => operand1 / operand2,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Where a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The first worker observed idle.
    AnyWorker,
    /// A specific worker, by 1-based id.
    Worker(usize),
}

impl Target {
    /// Maps a configuration id to a target: 0 is the any-worker sentinel.
    pub fn from_id(id: usize) -> Target {
        match id {
            0 => Target::AnyWorker,
            n => Target::Worker(n),
        }
    }
}

/// One line of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Job {
    /// Position in the input; the index of the result slot.
    pub sequence_index: usize,
    pub target: Target,
    pub opcode: Opcode,
    pub operand1: f64,
    pub operand2: f64,
}

impl Job {
    pub fn expected(&self) -> f64 {
        self.opcode.apply(self.operand1, self.operand2)
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {}{}{}",
            self.sequence_index, self.operand1, self.opcode, self.operand2
        )
    }
}
