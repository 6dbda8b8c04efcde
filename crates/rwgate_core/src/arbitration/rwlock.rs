//! Reader-writer lock built from two mutexes.
//!
//! A content guard protects the value itself; a reader-count guard protects
//! the registry of active readers. The first reader acquires the content
//! guard on behalf of all readers, the last one releases it. Writers acquire
//! the content guard directly.
use std::{sync::Arc, time::Instant};

use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::{Duration, timeout},
};
#[cfg(feature = "rwgate_tracing")]
use tracing::debug;

use crate::arbitration::{
    CallerId,
    error::ArbitrationError,
    probe::{Section, SectionEvent, SectionProbe},
};

/// Registry of active readers, protected by the reader-count guard.
///
/// The content guard taken by the first reader lives inside the `Active`
/// variant, so "readers collectively hold the content guard" and "count >= 1"
/// cannot get out of sync.
enum ReaderRegistry<T> {
    Idle,
    Active { count: usize, content: OwnedMutexGuard<T> },
}

/// Membership in the read section, released on drop.
///
/// Dropping this is what leaves the read section, on every path: normal exit,
/// a panicking caller, or an in-flight read future dropped by middleware such
/// as `tower`'s timeout. The last reader out hands the content guard back to
/// writers.
struct ReadSection<T: Send + 'static> {
    readers: Arc<Mutex<ReaderRegistry<T>>>,
}

impl<T: Send + 'static> Drop for ReadSection<T> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.readers.try_lock() {
            leave_registry(&mut registry);
            return;
        }
        // Registry momentarily contended: finish the release on a task
        let readers = Arc::clone(&self.readers);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                leave_registry(&mut *readers.lock().await);
            });
        }
    }
}

/// Remove one reader from the registry. The last reader drops the stored
/// content guard, releasing the lock to writers.
fn leave_registry<T>(registry: &mut ReaderRegistry<T>) {
    match std::mem::replace(registry, ReaderRegistry::Idle) {
        ReaderRegistry::Active { count, content } if count > 1 => {
            *registry = ReaderRegistry::Active { count: count - 1, content };
        }
        // count == 1: dropping the stored guard releases the content gate
        ReaderRegistry::Active { .. } => {}
        ReaderRegistry::Idle => {}
    }
}

/// A readers-preference reader-writer lock over a protected value.
///
/// Any number of concurrent readers, or exactly one writer. A writer waits
/// until no readers are active; nothing prevents a sustained stream of new
/// readers from starving a waiting writer.
///
/// Handles are cheap to clone and share the same underlying state. Dropping
/// an in-flight read or write future, as timeout middleware does, releases
/// whatever the future had acquired.
pub struct ReaderWriterLock<T> {
    /// Content guard: exclusive access to the protected value.
    content: Arc<Mutex<T>>,
    /// Reader-count guard: protects only the reader registry.
    readers: Arc<Mutex<ReaderRegistry<T>>>,
    probe: Option<SectionProbe>,
}

impl<T> Clone for ReaderWriterLock<T> {
    fn clone(&self) -> Self {
        Self {
            content: Arc::clone(&self.content),
            readers: Arc::clone(&self.readers),
            probe: self.probe.clone(),
        }
    }
}

impl<T: Send + 'static> ReaderWriterLock<T> {
    pub fn new(initial: T) -> Self {
        Self {
            content: Arc::new(Mutex::new(initial)),
            readers: Arc::new(Mutex::new(ReaderRegistry::Idle)),
            probe: None,
        }
    }

    /// Attach a probe recording every completed read and write section.
    pub fn with_probe(mut self, probe: SectionProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of readers currently inside the read section.
    pub async fn active_readers(&self) -> usize {
        match &*self.readers.lock().await {
            ReaderRegistry::Idle => 0,
            ReaderRegistry::Active { count, .. } => *count,
        }
    }

    /// Observe the protected value under shared access.
    ///
    /// Blocks only while waiting for the reader-count guard (brief, unless a
    /// transitioning reader is parked there) or, as the first reader, while a
    /// writer holds the content guard.
    pub async fn read(&self, reader_id: CallerId) -> T
    where
        T: Clone,
    {
        self.read_section(reader_id, None).await
    }

    /// Observe the protected value, then stay inside the read section for
    /// `hold` (work simulation).
    pub async fn read_for(&self, reader_id: CallerId, hold: Duration) -> T
    where
        T: Clone,
    {
        self.read_section(reader_id, Some(hold)).await
    }

    /// Observe the protected value, giving up if shared access is not
    /// obtained within `wait`.
    ///
    /// Timing out leaves the lock untouched: the reader count is only
    /// incremented once access is granted.
    pub async fn read_timeout(
        &self,
        reader_id: CallerId,
        wait: Duration,
    ) -> Result<T, ArbitrationError>
    where
        T: Clone,
    {
        let Ok((value, inside, section)) = timeout(wait, self.enter_read()).await else {
            return Err(ArbitrationError::SharedAccessTimeout(reader_id));
        };
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] reader {} inside ({} active)", reader_id, inside);
        let entered_at = Instant::now();
        let exited_at = Instant::now();
        drop(section);
        self.record(Section::Read, reader_id, entered_at, exited_at, inside);
        Ok(value)
    }

    /// Mutate the protected value under exclusive access.
    ///
    /// Blocks until no readers and no other writer hold the content guard.
    /// The guard is released on every exit path, including a panicking
    /// mutation body.
    pub async fn write<R>(&self, writer_id: CallerId, mutate: impl FnOnce(&mut T) -> R) -> R {
        self.write_section(writer_id, None, mutate).await
    }

    /// Mutate the protected value, then stay inside the write section for
    /// `hold` (work simulation).
    pub async fn write_for<R>(
        &self,
        writer_id: CallerId,
        hold: Duration,
        mutate: impl FnOnce(&mut T) -> R,
    ) -> R {
        self.write_section(writer_id, Some(hold), mutate).await
    }

    /// Mutate the protected value, giving up if exclusive access is not
    /// obtained within `wait`.
    pub async fn write_timeout<R>(
        &self,
        writer_id: CallerId,
        wait: Duration,
        mutate: impl FnOnce(&mut T) -> R,
    ) -> Result<R, ArbitrationError> {
        let Ok(mut content) = timeout(wait, self.content.lock()).await else {
            return Err(ArbitrationError::ExclusiveAccessTimeout(writer_id));
        };
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] writer {} inside", writer_id);
        let entered_at = Instant::now();
        let out = mutate(&mut content);
        let exited_at = Instant::now();
        drop(content);
        self.record(Section::Write, writer_id, entered_at, exited_at, 0);
        Ok(out)
    }

    async fn read_section(&self, reader_id: CallerId, hold: Option<Duration>) -> T
    where
        T: Clone,
    {
        let (value, inside, section) = self.enter_read().await;
        let entered_at = Instant::now();
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] reader {} inside ({} active)", reader_id, inside);
        if let Some(hold) = hold {
            tokio::time::sleep(hold).await;
        }
        let exited_at = Instant::now();
        drop(section);
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] reader {} left", reader_id);
        self.record(Section::Read, reader_id, entered_at, exited_at, inside);
        value
    }

    async fn write_section<R>(
        &self,
        writer_id: CallerId,
        hold: Option<Duration>,
        mutate: impl FnOnce(&mut T) -> R,
    ) -> R {
        let mut content = self.content.lock().await;
        let entered_at = Instant::now();
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] writer {} inside", writer_id);
        let out = mutate(&mut content);
        if let Some(hold) = hold {
            tokio::time::sleep(hold).await;
        }
        let exited_at = Instant::now();
        drop(content);
        #[cfg(feature = "rwgate_tracing")]
        debug!("[rwlock] writer {} left", writer_id);
        self.record(Section::Write, writer_id, entered_at, exited_at, 0);
        out
    }

    /// Join the read section and observe the value.
    ///
    /// The first reader acquires the content guard on behalf of all readers,
    /// while still holding the reader-count guard; later readers only bump
    /// the count. Returns the observed value, the reader count after entry,
    /// and the section membership whose drop performs the exit. Cancellation
    /// before completion leaves the registry untouched; once this returns,
    /// release is guaranteed even if the surrounding future is dropped.
    async fn enter_read(&self) -> (T, usize, ReadSection<T>)
    where
        T: Clone,
    {
        let mut registry = self.readers.lock().await;
        let (value, inside) = match &mut *registry {
            ReaderRegistry::Active { count, content } => {
                *count += 1;
                ((**content).clone(), *count)
            }
            ReaderRegistry::Idle => {
                let content = Arc::clone(&self.content).lock_owned().await;
                let value = (*content).clone();
                *registry = ReaderRegistry::Active { count: 1, content };
                (value, 1)
            }
        };
        (value, inside, ReadSection { readers: Arc::clone(&self.readers) })
    }

    fn record(
        &self,
        section: Section,
        caller: CallerId,
        entered_at: Instant,
        exited_at: Instant,
        readers_inside: usize,
    ) {
        if let Some(probe) = &self.probe {
            probe.record(SectionEvent { section, caller, entered_at, exited_at, readers_inside });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unit_rwlock_read_returns_initial_value() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(42u64);
        assert_eq!(lock.read(0).await, 42);
        assert_eq!(lock.active_readers().await, 0);
    }

    #[tokio::test]
    async fn unit_rwlock_write_then_read() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(0u64);
        let updated = lock.write(0, |v| {
            *v += 1;
            *v
        });
        assert_eq!(updated.await, 1);
        assert_eq!(lock.read(0).await, 1);
    }

    #[tokio::test]
    async fn unit_rwlock_reader_count_transitions() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(0u64);
        let lock_clone = lock.clone();
        let reader = tokio::spawn(async move {
            lock_clone.read_for(0, Duration::from_millis(50)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lock.active_readers().await, 1);
        reader.await.unwrap();
        assert_eq!(lock.active_readers().await, 0);
    }

    #[tokio::test]
    async fn unit_rwlock_write_timeout_while_writer_active() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(0u64);
        let lock_clone = lock.clone();
        let writer = tokio::spawn(async move {
            lock_clone.write_for(0, Duration::from_millis(100), |v| *v += 1).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            lock.write_timeout(1, Duration::from_millis(5), |v| *v += 1).await,
            Err(ArbitrationError::ExclusiveAccessTimeout(1))
        );
        writer.await.unwrap();
        // The timed-out attempt must not have touched the value
        assert_eq!(lock.read(0).await, 1);
    }

    #[tokio::test]
    async fn unit_rwlock_read_timeout_while_writer_active() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(0u64);
        let lock_clone = lock.clone();
        let writer = tokio::spawn(async move {
            lock_clone.write_for(0, Duration::from_millis(100), |v| *v += 1).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            lock.read_timeout(0, Duration::from_millis(5)).await,
            Err(ArbitrationError::SharedAccessTimeout(0))
        );
        // The cancelled acquisition must leave the registry idle
        writer.await.unwrap();
        assert_eq!(lock.active_readers().await, 0);
        assert_eq!(lock.read_timeout(0, Duration::from_millis(50)).await, Ok(1));
    }

    #[tokio::test]
    async fn unit_rwlock_cancelled_read_releases_section() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(3u64);
        // Dropping the read future mid-hold, the way timeout middleware does
        let cancelled =
            timeout(Duration::from_millis(5), lock.read_for(0, Duration::from_millis(100))).await;
        assert!(cancelled.is_err());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lock.active_readers().await, 0);
        // A writer acquires promptly instead of blocking behind a leaked reader
        assert_eq!(lock.write_timeout(0, Duration::from_millis(50), |v| *v + 1).await, Ok(4));
    }

    #[tokio::test]
    async fn unit_rwlock_released_after_panicking_write_body() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(0u64);
        let lock_clone = lock.clone();
        let poisoned = tokio::spawn(async move {
            lock_clone.write(0, |_| panic!("write body failure")).await;
        });
        assert!(poisoned.await.is_err());
        // The content guard must have been released during unwinding
        assert_eq!(lock.write_timeout(1, Duration::from_millis(50), |v| *v + 1).await, Ok(1));
    }

    #[tokio::test]
    async fn unit_rwlock_readers_share_while_counted() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let lock = ReaderWriterLock::new(7u64);
        let lock_clone = lock.clone();
        let first = tokio::spawn(async move {
            lock_clone.read_for(0, Duration::from_millis(50)).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        // A second reader joins without waiting for the first to leave
        assert_eq!(lock.read_timeout(1, Duration::from_millis(5)).await, Ok(7));
        assert_eq!(first.await.unwrap(), 7);
    }
}
