// SPDX-License-Identifier: MIT
//! # Dispatcher
//!
//! Routes jobs to the pool and collects results one step late: a worker's
//! result is read just before its mailbox receives the next job, or at
//! shutdown.
//!
//! Per job for worker `w`:
//! 1. prime `w` if this is the first time it is used,
//! 2. `wait(done[w])`,
//! 3. collect the pending result of `w`, if any,
//! 4. write the job into the mailbox, remember its slot,
//! 5. `signal(ready[w])`.
//!
//! A fresh worker has never posted `done`, so priming posts it once on the
//! worker's behalf. Jobs for id 0 go to the first idle worker found by a
//! spinning round-robin scan over the `done` counters.

use log::{debug, info};

use crate::error::{CalcError, Result};
use crate::job::{Job, Target};
use crate::job_source::JobPlan;
use crate::pool::{Backend, Mailbox, WorkerPool};

pub mod phase;

use phase::{Event, Phase};

pub struct Dispatcher<B: Backend> {
    pool: WorkerPool<B>,
    phases: Vec<Phase>,
    results: Vec<Option<f64>>,
    /// Where the next free-worker scan starts.
    cursor: usize,
    routed: Vec<usize>,
}

impl<B: Backend> Dispatcher<B> {
    /// Starts a pool of `n_proc` workers for a run of `n_jobs` jobs.
    pub fn start(backend: B, n_proc: usize, n_jobs: usize) -> Result<Self> {
        let pool = WorkerPool::start(backend, n_proc)?;
        Ok(Self {
            pool,
            phases: vec![Phase::NeverPrimed; n_proc],
            results: vec![None; n_jobs],
            cursor: 0,
            routed: vec![0; n_proc],
        })
    }

    pub fn n_proc(&self) -> usize {
        self.pool.n_proc()
    }

    /// Number of jobs handed to each worker so far, by 0-based index.
    pub fn jobs_per_worker(&self) -> &[usize] {
        &self.routed
    }

    /// Hands `job` to a worker and returns the worker's 1-based id.
    ///
    /// Blocks while the chosen worker is still busy with its previous job.
    /// An any-worker job spins until some worker is idle.
    pub fn route(&mut self, job: &Job) -> Result<usize> {
        let n_proc = self.n_proc();
        if job.sequence_index >= self.results.len() {
            return Err(CalcError::config(
                format!("job #{}", job.sequence_index),
                format!("sequence index beyond the {} jobs of this run", self.results.len()),
            ));
        }

        let index = match job.target {
            Target::Worker(id) if (1..=n_proc).contains(&id) => {
                info!("sending job #{} to worker {}", job.sequence_index, id);
                id - 1
            }
            Target::Worker(id) => {
                return Err(CalcError::config(
                    format!("job #{}", job.sequence_index),
                    format!("worker id {id} out of range (0..={n_proc})"),
                ));
            }
            Target::AnyWorker => {
                let index = self.find_idle_worker()?;
                info!(
                    "any-worker job #{} activated worker {}",
                    job.sequence_index,
                    index + 1
                );
                index
            }
        };

        self.prime(index)?;
        self.acquire(index)?;

        let mailbox = self.pool.mailbox(index);
        mailbox.store(mailbox.load().with_job(job));
        self.transition(index, Event::Dispatch(job.sequence_index))?;
        self.routed[index] += 1;

        self.pool.sync_pair(index).signal_ready(self.pool.signals()?)?;
        Ok(index + 1)
    }

    /// Collects every outstanding result, terminates and reaps all workers,
    /// frees the pool and returns the results in sequence order.
    pub fn shutdown(mut self) -> Result<Vec<f64>> {
        for index in 0..self.n_proc() {
            self.prime(index)?;
            self.acquire(index)?;

            let mailbox = self.pool.mailbox(index);
            mailbox.store(mailbox.load().with_terminate());
            self.transition(index, Event::Terminate)?;
            self.pool.sync_pair(index).signal_ready(self.pool.signals()?)?;
            debug!("sent TERMINATE to worker {}", index + 1);
        }

        self.pool.join_all()?;
        let Dispatcher {
            pool,
            results,
            routed,
            ..
        } = self;
        let backend = pool.backend_name();
        pool.close()?;
        info!(
            "{} jobs done by {} workers ({} backend), jobs per worker {:?}",
            results.len(),
            routed.len(),
            backend,
            routed
        );

        results
            .into_iter()
            .enumerate()
            .map(|(slot, value)| {
                value.ok_or_else(|| {
                    CalcError::Protocol(format!("no result was collected for job #{slot}"))
                })
            })
            .collect()
    }

    /// Posts the first `done` of a worker that never ran, unless one is
    /// already there.
    fn prime(&mut self, index: usize) -> Result<()> {
        if self.phases[index].is_primed() {
            return Ok(());
        }
        let pair = self.pool.sync_pair(index);
        let signals = self.pool.signals()?;
        if pair.peek_done(signals)? == 0 {
            pair.signal_done(signals)?;
            debug!("primed worker {}", index + 1);
        } else {
            debug!("worker {} was already signalled idle", index + 1);
        }
        self.transition(index, Event::Prime)
    }

    /// Waits until the worker is idle and collects its pending result.
    fn acquire(&mut self, index: usize) -> Result<()> {
        let pending = match self.phases[index] {
            Phase::Released { pending } => pending,
            _ => None,
        };
        // Checked before waiting: an unprimed worker would block forever.
        self.transition(index, Event::Acquire)?;
        self.pool.sync_pair(index).wait_done(self.pool.signals()?)?;

        if let Some(slot) = pending {
            let value = self.pool.mailbox(index).load().result;
            self.store_result(slot, value)?;
            debug!(
                "collected result of job #{} from worker {}: {}",
                slot,
                index + 1,
                value
            );
        }
        Ok(())
    }

    /// Busy round-robin scan for a worker whose `done` counter is posted.
    /// Never blocks; between fruitless laps it only yields the CPU.
    fn find_idle_worker(&mut self) -> Result<usize> {
        let n_proc = self.n_proc();
        for index in 0..n_proc {
            self.prime(index)?;
        }

        let mut laps: u64 = 0;
        loop {
            for step in 0..n_proc {
                let index = (self.cursor + step) % n_proc;
                let signals = self.pool.signals()?;
                if self.pool.sync_pair(index).peek_done(signals)? > 0 {
                    self.cursor = (index + 1) % n_proc;
                    if laps > 0 {
                        debug!("found idle worker {} after {} laps", index + 1, laps);
                    }
                    return Ok(index);
                }
            }
            laps += 1;
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    fn store_result(&mut self, slot: usize, value: f64) -> Result<()> {
        match self.results.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(value);
                Ok(())
            }
            Some(Some(_)) => Err(CalcError::Protocol(format!(
                "result of job #{slot} collected twice"
            ))),
            None => Err(CalcError::Protocol(format!("no result slot for job #{slot}"))),
        }
    }

    fn transition(&mut self, index: usize, event: Event) -> Result<()> {
        let phase = self.phases[index];
        self.phases[index] = phase.next(event).ok_or_else(|| {
            CalcError::Protocol(format!(
                "worker {}: {:?} is not allowed in phase {:?}",
                index + 1,
                event,
                phase
            ))
        })?;
        Ok(())
    }
}

/// Runs a whole plan: starts the pool, routes every job in order and shuts
/// the pool down. Returns the results in sequence order.
pub fn run<B: Backend>(backend: B, plan: &JobPlan) -> Result<Vec<f64>> {
    let mut dispatcher = Dispatcher::start(backend, plan.n_proc, plan.jobs.len())?;
    for job in &plan.jobs {
        dispatcher.route(job)?;
    }
    dispatcher.shutdown()
}
