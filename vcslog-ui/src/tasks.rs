use anyhow::{anyhow, Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

type Job<T> = Box<dyn FnOnce() -> Result<T> + Send>;

/// Single background worker running jobs in submission order.
///
/// Results come back on a channel in the same order and are collected by
/// the owning thread; jobs cannot be cancelled once submitted.
pub struct TaskQueue<T> {
    jobs: Option<Sender<Job<T>>>,
    results: Receiver<Result<T>>,
    worker: Option<JoinHandle<()>>,
    pending: usize,
}

impl<T: Send + 'static> TaskQueue<T> {
    pub fn new(name: &str) -> Result<Self> {
        let (job_tx, job_rx) = channel::<Job<T>>();
        let (result_tx, result_rx) = channel();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in job_rx {
                    let result = panic::catch_unwind(AssertUnwindSafe(job))
                        .unwrap_or_else(|_| Err(anyhow!("background task panicked")));
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to start background worker")?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            worker: Some(worker),
            pending: 0,
        })
    }

    pub fn submit<F>(&mut self, job: F)
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(jobs) = &self.jobs else {
            return;
        };
        if jobs.send(Box::new(job)).is_err() {
            warn!("background worker is gone, task dropped");
            return;
        }
        self.pending += 1;
    }

    /// Submitted jobs whose result has not been collected yet
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn try_next(&mut self) -> Option<Result<T>> {
        let result = self.results.try_recv().ok()?;
        self.pending -= 1;
        Some(result)
    }

    pub fn wait_next(&mut self, timeout: Duration) -> Option<Result<T>> {
        if self.pending == 0 {
            return None;
        }
        match self.results.recv_timeout(timeout) {
            Ok(result) => {
                self.pending -= 1;
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.pending = 0;
                None
            }
        }
    }
}

impl<T> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Barrier};

    #[test]
    fn results_arrive_in_submission_order() {
        let mut queue = TaskQueue::new("test-tasks").unwrap();
        for i in 0..5 {
            queue.submit(move || {
                thread::sleep(Duration::from_millis(5 - i));
                Ok(i)
            });
        }
        let mut seen = Vec::new();
        while let Some(result) = queue.wait_next(Duration::from_secs(5)) {
            seen.push(result.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn failures_and_panics_become_errors() {
        let mut queue: TaskQueue<u32> = TaskQueue::new("test-tasks").unwrap();
        queue.submit(|| anyhow::bail!("read failed"));
        queue.submit(|| panic!("boom"));
        queue.submit(|| Ok(7));

        let first = queue.wait_next(Duration::from_secs(5)).unwrap();
        assert_eq!(first.unwrap_err().to_string(), "read failed");
        assert!(queue.wait_next(Duration::from_secs(5)).unwrap().is_err());
        assert_eq!(queue.wait_next(Duration::from_secs(5)).unwrap().unwrap(), 7);
    }

    #[test]
    fn try_next_does_not_block() {
        let mut queue = TaskQueue::new("test-tasks").unwrap();
        let gate = Arc::new(Barrier::new(2));
        let job_gate = gate.clone();
        queue.submit(move || {
            job_gate.wait();
            Ok(())
        });
        assert!(queue.try_next().is_none());
        assert_eq!(queue.pending(), 1);
        gate.wait();
        assert!(queue.wait_next(Duration::from_secs(5)).is_some());
    }
}
