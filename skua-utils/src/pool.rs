//! Fixed-size worker pool: launch N copies of a job on scoped threads, join
//! them all, then report the first failure. All parallel phases in skua are
//! launch-all/join-all; a fatal error in one worker does not interrupt the
//! others, it only decides the overall result.

use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Default worker count for parallel phases.
pub fn default_workers() -> usize {
    num_cpus::get()
}

/// Run `workers` copies of `job`, passing each its worker index. Every
/// worker runs to completion; the first error (in join order) is returned
/// after all have been joined.
pub fn run_workers<E, F>(workers: usize, job: F) -> Result<(), E>
where
    E: Send + From<PoolError>,
    F: Fn(usize) -> Result<(), E> + Sync,
{
    let workers = workers.max(1);
    let job = &job;

    thread::scope(|s| {
        let handles = (0..workers)
            .map(|id| s.spawn(move || job(id)))
            .collect::<Vec<_>>();

        let mut first = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first.is_none() {
                        first = Some(e);
                    }
                }
                Err(_) => {
                    if first.is_none() {
                        first = Some(E::from(PoolError::WorkerPanicked));
                    }
                }
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{run_workers, PoolError};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("boom: {0}")]
        Boom(usize),
        #[error(transparent)]
        Pool(#[from] PoolError),
    }

    #[test]
    fn test_all_workers_run() {
        let ran = AtomicUsize::new(0);
        run_workers::<TestError, _>(4, |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_error_reported_after_join() {
        let ran = AtomicUsize::new(0);
        let res = run_workers::<TestError, _>(4, |id| {
            ran.fetch_add(1, Ordering::SeqCst);
            if id == 2 {
                return Err(TestError::Boom(id));
            }
            Ok(())
        });
        assert!(res.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 4);
    }
}
