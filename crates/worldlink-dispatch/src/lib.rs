//! Ordered dispatch of decoded Worldlink messages.
//!
//! A [`Dispatcher`] is one code-space's inbound queue. Transport tasks push
//! decoded messages (and fragments, which hold their queue position until
//! reassembled); the host drains the queue once per frame and handlers run
//! in three phases per type code:
//!
//! - **pre**: may return [`HandlerFlow::Delay`] to stop the drain and keep
//!   the message at the head for the next one,
//! - **main**: the handlers proper,
//! - **post**: skipped when an earlier handler aborted.
//!
//! [`ClockSync`] maps server timestamps into local time.
//!
//! ```ignore
//! let world = Dispatcher::<WorldMessage>::new();
//! world.on(WorldMessageType::Comm.code(), |msg| {
//!     tracing::info!(subject = msg.subject_id, "chat");
//!     Ok(HandlerFlow::Continue)
//! });
//! // once per frame
//! world.drain(DrainLimits::messages(200));
//! ```

pub mod clock;
mod config;
mod dispatcher;
mod handlers;
mod stats;

pub use clock::{now_millis, ClockSync, MAX_DRIFT_MS};
pub use config::DrainLimits;
pub use dispatcher::{Dispatcher, DrainOutcome, DrainReport, Filter};
pub use handlers::{Handler, HandlerError, HandlerFlow, HandlerId, HandlerResult, Phase};
pub use stats::{DispatchStats, RateCounter};
