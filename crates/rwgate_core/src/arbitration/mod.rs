//! Reader-writer arbitration module.
//!
//! Arbitrates concurrent access to a single protected value: any number of
//! concurrent readers, or exactly one writer, never both.
//!
//! ## Architecture
//!
//! The lock is composed from two lower-level mutual exclusion primitives:
//!
//! - **Content guard**: a `tokio::sync::Mutex` wrapping the protected value.
//!   Held by one writer, or collectively by the active readers.
//! - **Reader-count guard**: a second mutex protecting the registry of active
//!   readers. The first reader to arrive takes the content guard on behalf of
//!   all readers; the last reader to leave drops it.
//!
//! This is a readers-preference policy: arriving readers are never blocked by
//! a *waiting* writer, only by an *active* one, so a sustained stream of
//! readers can starve writers indefinitely. The policy is preserved as
//! documented behavior, not corrected.
//!
//! ## Components
//!
//! - [`rwlock::ReaderWriterLock`]: the primitive itself, generic over the
//!   protected payload.
//! - [`probe::SectionProbe`]: enter/exit timestamp instrumentation used to
//!   verify exclusion and concurrency properties.
//! - [`service::AccessService`]: `tower::Service` facade over a shared
//!   counter, composable with `tower` middleware such as `TimeoutLayer`.
pub mod error;
pub mod probe;
pub mod rwlock;
pub mod service;

/// Caller identifier carried through operations for logging and
/// instrumentation. Reader ids and writer ids are independent namespaces.
pub type CallerId = u32;

/// The protected value of the standard demo stack: a shared counter that
/// writers increment.
pub type SharedCounter = rwlock::ReaderWriterLock<u64>;

/// Initialize the standard probe-instrumented arbitration stack.
///
/// Returns the service facade over a shared counter together with the probe
/// recording every read and write section, ready for analysis.
pub fn init_shared_counter(initial: u64) -> (service::AccessService, probe::SectionProbe) {
    let probe = probe::SectionProbe::default();
    let lock = rwlock::ReaderWriterLock::new(initial).with_probe(probe.clone());
    (service::AccessService::new(lock), probe)
}
