//! Running a segmentation off the calling thread.
//!
//! With the `threads` feature, a whole run is placed on a single-thread [`rayon`] pool that is
//! shared by the process. The pool is created when the first task needs it and torn down once
//! no task holds it anymore. If the pool cannot be created, the run happens on the calling
//! thread instead. Both paths seed the random number generator the same way and call the
//! same [`segment`] function, so a given seed always gives the same output.
//!
//! Progress is only reported at a few coarse [`Progress`] milestones.

use crate::{segment, Params, Planes, Result, SegmentError, Segmented};

use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
        Arc,
    },
    time::Duration,
};
#[cfg(feature = "threads")]
use {
    log::warn,
    rayon::{ThreadPool, ThreadPoolBuilder},
    std::sync::{Mutex, PoisonError},
};

/// A shared flag used to cancel a running segmentation.
///
/// Clones refer to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a new token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. This cannot be undone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Checks whether the run holding this token should stop.
    ///
    /// # Errors
    /// Returns [`SegmentError::Aborted`] if cancellation has been requested.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            debug!("segmentation cancelled");
            Err(SegmentError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// The coarse milestones of a background run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Progress {
    /// The input pixels have been read.
    InputReady,
    /// The run has been handed off for computation.
    Dispatched,
    /// The output pixels are available.
    ResultReady,
    /// The run has finished.
    Done,
}

impl Progress {
    /// Returns the approximate fraction of the work completed at this milestone.
    #[must_use]
    pub const fn fraction(self) -> f32 {
        match self {
            Progress::InputReady => 0.05,
            Progress::Dispatched => 0.1,
            Progress::ResultReady => 0.9,
            Progress::Done => 1.0,
        }
    }
}

/// Returns `seed`, or a fresh random seed if there is none.
#[cfg_attr(not(feature = "pipelines"), allow(dead_code))]
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let seed = rand::thread_rng().gen();
        debug!("using random seed {seed}");
        seed
    })
}

/// Runs [`segment`] with a generator seeded from `seed`.
///
/// # Errors
/// See [`segment`].
pub fn segment_seeded(
    planes: Planes,
    params: &Params,
    seed: u64,
    cancel: &CancelToken,
) -> Result<Segmented> {
    let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
    segment(planes, params, &mut rng, cancel)
}

/// Turns a panic payload into a [`SegmentError::Failed`].
fn panic_error(payload: &(dyn Any + Send)) -> SegmentError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    };
    SegmentError::Failed(message)
}

/// Runs a seeded segmentation, turning a panic into an error.
fn run_job(planes: Planes, params: &Params, seed: u64, cancel: &CancelToken) -> Result<Segmented> {
    panic::catch_unwind(AssertUnwindSafe(|| segment_seeded(planes, params, seed, cancel)))
        .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())))
}

/// The process-wide worker pool, if one is alive.
#[cfg(feature = "threads")]
static POOL: Mutex<Option<Arc<ThreadPool>>> = Mutex::new(None);

/// Gets the worker pool, creating it if needed.
///
/// Returns `None` if the pool could not be created.
#[cfg(feature = "threads")]
fn acquire_pool() -> Option<Arc<ThreadPool>> {
    let mut pool = POOL.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pool.as_ref() {
        return Some(Arc::clone(pool));
    }

    match ThreadPoolBuilder::new()
        .num_threads(1)
        .thread_name(|i| format!("blobify-worker-{i}"))
        .build()
    {
        Ok(new) => {
            debug!("created worker pool");
            let new = Arc::new(new);
            *pool = Some(Arc::clone(&new));
            Some(new)
        }
        Err(err) => {
            warn!("failed to create worker pool, running on the calling thread: {err}");
            None
        }
    }
}

/// Gives back a handle from [`acquire_pool`], tearing the pool down if no one else holds it.
#[cfg(feature = "threads")]
fn release_pool(handle: Arc<ThreadPool>) {
    let mut pool = POOL.lock().unwrap_or_else(PoisonError::into_inner);
    drop(handle);
    if pool.as_ref().is_some_and(|p| Arc::strong_count(p) == 1) {
        *pool = None;
        debug!("tore down worker pool");
    }
}

/// Whether the process-wide worker pool currently exists.
#[cfg(feature = "threads")]
#[must_use]
pub fn pool_is_alive() -> bool {
    POOL.lock().unwrap_or_else(PoisonError::into_inner).is_some()
}

/// How often a waiting task checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A segmentation that was handed off by [`spawn_segment`].
///
/// Dropping a task without waiting on it detaches it.
/// The run stops at its next checkpoint if the task was cancelled.
#[derive(Debug)]
pub struct Task {
    /// Receives the result of the run.
    receiver: Receiver<Result<Segmented>>,
    /// The cancellation flag shared with the run.
    cancel: CancelToken,
    /// The pool the run was placed on, if any.
    #[cfg(feature = "threads")]
    pool: Option<Arc<ThreadPool>>,
}

impl Task {
    /// Requests cancellation of the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Blocks until the run finishes or is cancelled.
    ///
    /// # Errors
    /// Returns [`SegmentError::Aborted`] as soon as cancellation is observed, without waiting for
    /// the run to stop. Returns [`SegmentError::Failed`] if the run panicked or went away.
    pub fn wait(self) -> Result<Segmented> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(SegmentError::Aborted);
            }

            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(if self.cancel.is_cancelled() {
                        SegmentError::Aborted
                    } else {
                        SegmentError::Failed("worker exited without a result".to_owned())
                    });
                }
            }
        }
    }
}

#[cfg(feature = "threads")]
impl Drop for Task {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            release_pool(pool);
        }
    }
}

/// Starts a segmentation of `planes` on the worker pool.
///
/// The run uses a generator seeded from `seed` and checks `cancel` as described in [`segment`].
/// If the worker pool is unavailable (or the `threads` feature is disabled),
/// the run completes on the calling thread before this function returns.
#[must_use]
pub fn spawn_segment(planes: Planes, params: Params, seed: u64, cancel: CancelToken) -> Task {
    let (sender, receiver) = mpsc::channel();

    #[cfg(feature = "threads")]
    if let Some(handle) = acquire_pool() {
        let token = cancel.clone();
        handle.spawn(move || {
            // the receiver is gone if the task was dropped or aborted
            let _ = sender.send(run_job(planes, &params, seed, &token));
        });
        return Task { receiver, cancel, pool: Some(handle) };
    }

    let _ = sender.send(run_job(planes, &params, seed, &cancel));
    Task {
        receiver,
        cancel,
        #[cfg(feature = "threads")]
        pool: None,
    }
}

/// Runs [`spawn_segment`] and waits on it, reporting every milestone up to
/// [`Progress::ResultReady`] to `on_progress`.
#[cfg_attr(not(feature = "pipelines"), allow(dead_code))]
pub(crate) fn run_background(
    planes: Planes,
    params: Params,
    seed: u64,
    cancel: &CancelToken,
    on_progress: &mut impl FnMut(Progress),
) -> Result<Segmented> {
    on_progress(Progress::InputReady);
    let task = spawn_segment(planes, params, seed, cancel.clone());
    on_progress(Progress::Dispatched);
    let segmented = task.wait()?;
    on_progress(Progress::ResultReady);
    Ok(segmented)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn noise_planes() -> Planes {
        let rgba = noise_rgba(48, 32, 21);
        Planes::from_rgba(&rgba, 48, 32).unwrap()
    }

    fn params() -> Params {
        Params {
            blur_radius: 2,
            blur_passes: 2,
            colors: 6.into(),
            min_region_size: 12,
            ..Params::DEFAULT
        }
    }

    #[test]
    fn background_matches_calling_thread() {
        let direct = segment_seeded(noise_planes(), &params(), 77, &CancelToken::new()).unwrap();
        let task = spawn_segment(noise_planes(), params(), 77, CancelToken::new());
        assert_eq!(task.wait().unwrap(), direct);
    }

    #[test]
    fn cancelled_before_start_aborts() {
        let token = CancelToken::new();
        token.cancel();
        let task = spawn_segment(noise_planes(), params(), 1, token);
        assert!(task.wait().unwrap_err().is_aborted());
    }

    #[test]
    fn cancelled_task_aborts() {
        let task = spawn_segment(noise_planes(), Params::DEFAULT, 1, CancelToken::new());
        task.cancel();
        assert!(matches!(task.wait(), Err(SegmentError::Aborted)));
    }

    #[test]
    fn panics_become_failures() {
        let err = panic_error(&"boom");
        assert!(matches!(err, SegmentError::Failed(ref m) if m == "boom"));
        let err = panic_error(&String::from("bang"));
        assert!(matches!(err, SegmentError::Failed(ref m) if m == "bang"));
        let err = panic_error(&42);
        assert!(!err.is_aborted());
    }

    #[test]
    fn progress_fractions_increase() {
        let milestones = [
            Progress::InputReady,
            Progress::Dispatched,
            Progress::ResultReady,
            Progress::Done,
        ];
        assert!(milestones
            .windows(2)
            .all(|w| w[0].fraction() < w[1].fraction()));
        assert!((Progress::Done.fraction() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn resolve_seed_keeps_given_seed() {
        assert_eq!(resolve_seed(Some(5)), 5);
    }
}
