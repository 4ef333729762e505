//! # spinpoll
//!
//! A bounded retry/poll primitive for absorbing timing non-determinism:
//! repeatedly perform an asynchronous action and validate its payload with a
//! synchronous check, until the check passes or an overall deadline elapses.
//! Handy wherever an operation's effect becomes observable only after an
//! unpredictable delay, such as UI state that lags behind the call that
//! triggered it.
//!
//! # Features
//!
//! - Deferred first attempt: [`spin`] never runs user code synchronously,
//!   so the returned handle can be configured before anything fires
//! - Strictly sequential attempts with a fixed wait between failures
//! - Exactly-once terminal callback, with either success or a single
//!   [`SpinTimeout`] embedding the most recent failure's diagnostics
//! - Append-only failure history for test-failure output
//! - Process-wide default timing with explicit lifecycle
//!   ([`defaults`]/[`set_defaults`]/[`reset_defaults`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use spinpoll::{spin_with_config, SpinConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SpinConfig::default().with_wait(Duration::from_millis(250));
//!     let spinner = spin_with_config(
//!         config,
//!         || async {
//!             // poll some slow-to-settle state
//!             Ok::<_, anyhow::Error>(3u32)
//!         },
//!         |observed| {
//!             anyhow::ensure!(observed >= 3, "only {observed} replicas ready");
//!             Ok(())
//!         },
//!         |outcome| {
//!             if let Err(err) = outcome {
//!                 eprintln!("{err}");
//!             }
//!         },
//!     );
//!     spinner.start().await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod spinner;

pub use config::{defaults, reset_defaults, set_defaults, SpinConfig, DEFAULT_TIMEOUT, DEFAULT_WAIT};
pub use error::{AttemptError, AttemptErrorKind, SpinTimeout};
pub use spinner::{spin, spin_with_config, Spinner};
