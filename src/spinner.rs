//! The spin state machine
//!
//! A [`Spinner`] repeatedly performs an asynchronous action and validates
//! its payload with a synchronous check, until the check passes, the overall
//! deadline elapses, or the terminal callback itself panics. Attempts run
//! strictly sequentially; the next attempt is never initiated before the
//! previous one's outcome is fully resolved.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{self, SpinConfig};
use crate::error::{AttemptError, SpinTimeout};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The caller-supplied callables, held until the cycle claims them.
///
/// Taking these out of their slot is what marks the spinner started; once
/// the cycle finishes, `action` and `check` are dropped and `done` is
/// consumed, so no path exists by which any of them could run again.
struct Hooks<P> {
    action: Box<dyn FnMut() -> BoxFuture<anyhow::Result<P>> + Send>,
    check: Box<dyn FnMut(P) -> anyhow::Result<()> + Send>,
    done: Box<dyn FnOnce(Result<(), SpinTimeout>) + Send>,
}

struct Inner<P> {
    started_at: Instant,
    timeout_ms: AtomicU64,
    wait_ms: AtomicU64,
    started: AtomicBool,
    finished: AtomicBool,
    errors: Mutex<Vec<AttemptError>>,
    hooks: Mutex<Option<Hooks<P>>>,
}

/// Handle to one spin cycle
///
/// Returned by [`spin`]/[`spin_with_config`]. Cloning the handle shares the
/// same underlying cycle. The timing values can be adjusted through the
/// handle at any point; attempts already in flight keep the wait/deadline
/// they read, later cycle steps see the new values.
pub struct Spinner<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for Spinner<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Spinner<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinner")
            .field("timeout", &self.timeout())
            .field("wait", &self.wait())
            .field("started", &self.started())
            .field("finished", &self.is_finished())
            .field("errors", &self.error_count())
            .finish()
    }
}

/// Spin on an action until the check passes or the deadline elapses
///
/// Constructs a spinner seeded from the process-wide
/// [`defaults`](crate::defaults) and schedules its first attempt as a
/// deferred task, so no user code runs before this returns. The returned
/// handle can adjust timing or trigger the cycle manually with
/// [`Spinner::start`] before the deferred task gets a turn.
///
/// Must be called from within a Tokio runtime.
///
/// # Arguments
///
/// * `action` - The asynchronous operation to retry; each attempt invokes
///   it once and awaits a payload or an error
/// * `check` - Synchronous validator run against each successful payload;
///   returning `Ok(())` completes the cycle
/// * `done` - Terminal callback, invoked exactly once with `Ok(())` on
///   success or the synthesized [`SpinTimeout`] on exhaustion
///
/// # Example
///
/// ```rust,no_run
/// use spinpoll::spin;
///
/// #[tokio::main]
/// async fn main() {
///     let spinner = spin(
///         || async { Ok::<_, anyhow::Error>("widget-ready") },
///         |state: &str| {
///             anyhow::ensure!(state == "widget-ready", "state was {state}");
///             Ok(())
///         },
///         |outcome| match outcome {
///             Ok(()) => println!("check passed"),
///             Err(err) => eprintln!("{err}"),
///         },
///     );
///     spinner.start().await;
/// }
/// ```
pub fn spin<P, A, Fut, C, D>(action: A, check: C, done: D) -> Spinner<P>
where
    P: Send + 'static,
    A: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
    C: FnMut(P) -> anyhow::Result<()> + Send + 'static,
    D: FnOnce(Result<(), SpinTimeout>) + Send + 'static,
{
    spin_with_config(config::defaults(), action, check, done)
}

/// [`spin`], but with explicit timing instead of the process-wide defaults
///
/// Must be called from within a Tokio runtime.
pub fn spin_with_config<P, A, Fut, C, D>(
    config: SpinConfig,
    action: A,
    check: C,
    done: D,
) -> Spinner<P>
where
    P: Send + 'static,
    A: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
    C: FnMut(P) -> anyhow::Result<()> + Send + 'static,
    D: FnOnce(Result<(), SpinTimeout>) + Send + 'static,
{
    let spinner = Spinner::new(config, action, check, done);
    let deferred = spinner.clone();
    tokio::spawn(async move { deferred.start().await });
    spinner
}

impl<P> Spinner<P>
where
    P: Send + 'static,
{
    fn new<A, Fut, C, D>(config: SpinConfig, mut action: A, check: C, done: D) -> Self
    where
        A: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<P>> + Send + 'static,
        C: FnMut(P) -> anyhow::Result<()> + Send + 'static,
        D: FnOnce(Result<(), SpinTimeout>) + Send + 'static,
    {
        let hooks = Hooks {
            action: Box::new(move || Box::pin(action()) as BoxFuture<anyhow::Result<P>>),
            check: Box::new(check),
            done: Box::new(done),
        };
        Self {
            inner: Arc::new(Inner {
                started_at: Instant::now(),
                timeout_ms: AtomicU64::new(config.timeout_ms),
                wait_ms: AtomicU64::new(config.wait_ms),
                started: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                errors: Mutex::new(Vec::new()),
                hooks: Mutex::new(Some(hooks)),
            }),
        }
    }

    /// Drive the cycle to completion
    ///
    /// Idempotent: the first caller (whether the deferred task or a manual
    /// invocation) claims the hooks and runs the attempt loop within this
    /// call; every later call returns immediately with no side effect.
    pub async fn start(&self) {
        let hooks = self.lock_hooks().take();
        let Some(hooks) = hooks else {
            return;
        };
        self.inner.started.store(true, Ordering::SeqCst);
        self.drive(hooks).await;
    }

    async fn drive(&self, mut hooks: Hooks<P>) {
        let mut attempt: u32 = 1;
        loop {
            tracing::debug!(attempt, "starting attempt");

            let failure = match (hooks.action)().await {
                Ok(payload) => match (hooks.check)(payload) {
                    Ok(()) => {
                        let elapsed = self.inner.started_at.elapsed();
                        if attempt > 1 {
                            tracing::info!(
                                attempt,
                                elapsed_ms = elapsed.as_millis() as u64,
                                "check passed after retry"
                            );
                        } else {
                            tracing::debug!(
                                elapsed_ms = elapsed.as_millis() as u64,
                                "check passed on first attempt"
                            );
                        }
                        self.finish(hooks, Ok(()));
                        return;
                    }
                    Err(err) => AttemptError::check(err),
                },
                Err(err) => AttemptError::action(err),
            };

            let elapsed = self.inner.started_at.elapsed();
            let most_recent = failure.message.clone();
            self.lock_errors().push(failure);

            if elapsed >= self.timeout() {
                tracing::error!(
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %most_recent,
                    "spin timed out"
                );
                self.finish(
                    hooks,
                    Err(SpinTimeout {
                        attempts: attempt,
                        elapsed,
                        most_recent,
                    }),
                );
                return;
            }

            let wait = self.wait();
            tracing::warn!(
                attempt,
                error = %most_recent,
                wait_ms = wait.as_millis() as u64,
                "attempt failed, will retry"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Terminal transition. The spinner is marked finished and the action
    /// and check are dropped before `done` runs, so even a panicking `done`
    /// leaves the spinner in its terminal state. A panic from `done` is not
    /// caught; it propagates out of whichever call drove the final attempt.
    fn finish(&self, hooks: Hooks<P>, outcome: Result<(), SpinTimeout>) {
        self.inner.finished.store(true, Ordering::SeqCst);
        let Hooks {
            action,
            check,
            done,
        } = hooks;
        drop(action);
        drop(check);
        done(outcome);
    }
}

impl<P> Spinner<P> {
    fn lock_hooks(&self) -> MutexGuard<'_, Option<Hooks<P>>> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_errors(&self) -> MutexGuard<'_, Vec<AttemptError>> {
        self.inner
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current overall deadline, measured from construction
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.inner.timeout_ms.load(Ordering::SeqCst))
    }

    /// Override the overall deadline
    ///
    /// Deadline checks already performed are unaffected; the next failed
    /// attempt compares elapsed time against the new value.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner
            .timeout_ms
            .store(config::clamp_ms(timeout), Ordering::SeqCst);
    }

    /// Current delay between a failed attempt and the next
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.inner.wait_ms.load(Ordering::SeqCst))
    }

    /// Override the inter-attempt delay
    ///
    /// A sleep already in progress keeps the delay it was scheduled with.
    pub fn set_wait(&self, wait: Duration) {
        self.inner
            .wait_ms
            .store(config::clamp_ms(wait), Ordering::SeqCst);
    }

    /// Whether the attempt cycle has begun
    pub fn started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Whether the terminal callback has run
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    /// Every failure recorded so far, in attempt order
    pub fn errors(&self) -> Vec<AttemptError> {
        self.lock_errors().clone()
    }

    /// Number of failed attempts so far
    pub fn error_count(&self) -> usize {
        self.lock_errors().len()
    }

    /// The most recent failure, if any attempt has failed
    pub fn last_error(&self) -> Option<AttemptError> {
        self.lock_errors().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn noop_done(_outcome: Result<(), SpinTimeout>) {}

    #[tokio::test]
    async fn test_handle_reports_seeded_timing() {
        let spinner = spin_with_config(
            SpinConfig {
                timeout_ms: 321,
                wait_ms: 12,
            },
            || async { Ok::<_, anyhow::Error>(()) },
            |_| Ok(()),
            noop_done,
        );
        assert_eq!(spinner.timeout(), Duration::from_millis(321));
        assert_eq!(spinner.wait(), Duration::from_millis(12));
        assert!(!spinner.started());
        assert!(!spinner.is_finished());
    }

    #[tokio::test]
    async fn test_timing_is_mutable_through_the_handle() {
        let spinner = spin_with_config(
            SpinConfig::default(),
            || async { Ok::<_, anyhow::Error>(()) },
            |_| Ok(()),
            noop_done,
        );
        spinner.set_timeout(Duration::from_millis(5));
        spinner.set_wait(Duration::from_millis(1));
        assert_eq!(spinner.timeout(), Duration::from_millis(5));
        assert_eq!(spinner.wait(), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_no_errors() {
        let spinner = spin_with_config(
            SpinConfig::default(),
            || async { Ok::<_, anyhow::Error>(7u32) },
            |n| {
                anyhow::ensure!(n == 7, "unexpected payload {n}");
                Ok(())
            },
            noop_done,
        );
        spinner.start().await;
        assert!(spinner.is_finished());
        assert!(spinner.errors().is_empty());
        assert_eq!(spinner.last_error().map(|e| e.message), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_history_preserves_attempt_order() {
        let spinner = spin_with_config(
            SpinConfig {
                timeout_ms: 2,
                wait_ms: 1,
            },
            {
                let mut n = 0u32;
                move || {
                    n += 1;
                    let failure = anyhow!("attempt {n} still pending");
                    async move { Err::<(), _>(failure) }
                }
            },
            |_: ()| Ok(()),
            noop_done,
        );
        spinner.start().await;

        let errors = spinner.errors();
        assert_eq!(errors.len(), 3);
        for (i, err) in errors.iter().enumerate() {
            assert!(err.is_action());
            assert!(err.message.contains(&format!("attempt {}", i + 1)));
        }
        let last = spinner.last_error().unwrap();
        assert!(last.message.contains("attempt 3"));
    }

    #[tokio::test]
    async fn test_debug_output_names_state() {
        let spinner = spin_with_config(
            SpinConfig::default(),
            || async { Ok::<_, anyhow::Error>(()) },
            |_| Ok(()),
            noop_done,
        );
        let debug = format!("{spinner:?}");
        assert!(debug.contains("Spinner"));
        assert!(debug.contains("started"));
    }
}
