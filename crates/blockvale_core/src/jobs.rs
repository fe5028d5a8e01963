use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

use crate::events::EventSender;

/// Worker pool for chunk jobs that only touch data they own.
///
/// Results never write back into shared state from a worker; they are sent to an
/// [`EventSender`] and applied by whoever drains the matching receiver, which is
/// the main thread for world data.
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("chunk-job-{index}"));
        if let Some(count) = num_threads {
            builder = builder.num_threads(count.max(1));
        }

        let pool = builder.build()?;
        debug!("Job system started with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` on a worker and posts its output as the continuation event.
    ///
    /// A closed receiver means the owner went away; the result is dropped.
    pub fn spawn_then<F, T>(&self, job: F, continuation: EventSender<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.pool.spawn(move || {
            let output = job();
            let _ = continuation.send(output);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::JobSystem;
    use crate::events::channel;

    #[test]
    fn continuation_receives_job_output() {
        let jobs = JobSystem::new(Some(2)).expect("build job system");
        let (tx, rx) = channel();

        for value in 0..8u32 {
            jobs.spawn_then(move || value * 2, tx.clone());
        }

        let mut results: Vec<u32> = (0..8).map(|_| rx.recv().expect("job result")).collect();
        results.sort_unstable();
        assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn zero_threads_is_clamped_to_one() {
        let jobs = JobSystem::new(Some(0)).expect("build job system");
        assert_eq!(jobs.thread_count(), 1);
    }
}
