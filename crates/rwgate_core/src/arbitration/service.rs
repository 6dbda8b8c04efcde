//! `tower::Service` facade over the shared counter.
//!
//! Wraps a [`ReaderWriterLock<u64>`] with the demo semantics: readers observe
//! the counter, writers increment it. Being a `tower::Service`, the facade
//! composes with standard middleware such as `TimeoutLayer`; a call the layer
//! cancels mid-flight releases whatever section it had entered.
use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::time::Duration;
use tower::Service;
#[cfg(feature = "rwgate_tracing")]
use tracing::info;

use crate::arbitration::{CallerId, error::ArbitrationError, rwlock::ReaderWriterLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    /// Observe the counter under shared access, optionally holding the read
    /// section for `hold`.
    Read { reader_id: CallerId, hold: Option<Duration> },
    /// Increment the counter under exclusive access, optionally holding the
    /// write section for `hold`.
    Write { writer_id: CallerId, hold: Option<Duration> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResponse {
    /// Counter value observed by a reader.
    Observed(u64),
    /// Counter value right after a writer's increment.
    Updated(u64),
}

/// Arbitrated access to a shared counter.
#[derive(Clone)]
pub struct AccessService {
    lock: ReaderWriterLock<u64>,
}

impl AccessService {
    pub fn new(lock: ReaderWriterLock<u64>) -> Self {
        Self { lock }
    }

    /// Handle on the underlying lock, for direct use alongside the service.
    pub fn lock(&self) -> ReaderWriterLock<u64> {
        self.lock.clone()
    }
}

impl Default for AccessService {
    fn default() -> Self {
        Self::new(ReaderWriterLock::new(0))
    }
}

impl Service<AccessRequest> for AccessService {
    type Response = AccessResponse;
    type Error = ArbitrationError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: AccessRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            match request {
                AccessRequest::Read { reader_id, hold } => {
                    #[cfg(feature = "rwgate_tracing")]
                    info!("[access] Read: reader_id: {}, hold: {:?}", reader_id, hold);
                    let value = match hold {
                        Some(hold) => this.lock.read_for(reader_id, hold).await,
                        None => this.lock.read(reader_id).await,
                    };
                    Ok(AccessResponse::Observed(value))
                }
                AccessRequest::Write { writer_id, hold } => {
                    #[cfg(feature = "rwgate_tracing")]
                    info!("[access] Write: writer_id: {}, hold: {:?}", writer_id, hold);
                    let increment = |v: &mut u64| {
                        *v += 1;
                        *v
                    };
                    let value = match hold {
                        Some(hold) => this.lock.write_for(writer_id, hold, increment).await,
                        None => this.lock.write(writer_id, increment).await,
                    };
                    Ok(AccessResponse::Updated(value))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tower::{ServiceBuilder, timeout::TimeoutLayer};

    use super::*;

    #[tokio::test]
    async fn unit_access_service_read_write_cycle() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let mut access = ServiceBuilder::new().service(AccessService::default());

        assert_eq!(
            access.call(AccessRequest::Read { reader_id: 0, hold: None }).await.unwrap(),
            AccessResponse::Observed(0)
        );
        assert_eq!(
            access.call(AccessRequest::Write { writer_id: 0, hold: None }).await.unwrap(),
            AccessResponse::Updated(1)
        );
        assert_eq!(
            access.call(AccessRequest::Read { reader_id: 1, hold: None }).await.unwrap(),
            AccessResponse::Observed(1)
        );
    }

    #[tokio::test]
    async fn unit_access_service_write_timed_out_behind_reader() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let access = AccessService::default();
        let mut bounded = ServiceBuilder::new()
            .layer(TimeoutLayer::new(Duration::from_millis(5)))
            .service(access.clone());

        // The holding reader runs unbounded; only the contending writer is
        let mut holder = access;
        let reader = tokio::spawn(async move {
            holder
                .call(AccessRequest::Read { reader_id: 0, hold: Some(Duration::from_millis(100)) })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The writer cannot enter while the reader holds the section
        assert_eq!(
            bounded
                .call(AccessRequest::Write { writer_id: 0, hold: None })
                .await
                .unwrap_err()
                .to_string(),
            "request timed out"
        );

        assert_eq!(reader.await.unwrap().unwrap(), AccessResponse::Observed(0));
    }

    #[tokio::test]
    async fn unit_access_service_readers_not_timed_out_behind_reader() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let access = AccessService::default();
        let mut bounded = ServiceBuilder::new()
            .layer(TimeoutLayer::new(Duration::from_millis(5)))
            .service(access.clone());

        let mut holder = access;
        let reader = tokio::spawn(async move {
            holder
                .call(AccessRequest::Read { reader_id: 0, hold: Some(Duration::from_millis(50)) })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A second reader joins the active read section well within the timeout
        assert_eq!(
            bounded.call(AccessRequest::Read { reader_id: 1, hold: None }).await.unwrap(),
            AccessResponse::Observed(0)
        );

        assert_eq!(reader.await.unwrap().unwrap(), AccessResponse::Observed(0));
    }

    #[tokio::test]
    async fn unit_access_service_cancelled_read_releases_lock() {
        #[cfg(feature = "rwgate_tracing")]
        crate::rwgate_tracing::init();
        let access = AccessService::default();
        let lock = access.lock();
        let mut bounded = ServiceBuilder::new()
            .layer(TimeoutLayer::new(Duration::from_millis(5)))
            .service(access);

        // The layer gives up mid-hold and drops the in-flight read
        assert_eq!(
            bounded
                .call(AccessRequest::Read { reader_id: 0, hold: Some(Duration::from_millis(100)) })
                .await
                .unwrap_err()
                .to_string(),
            "request timed out"
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lock.active_readers().await, 0);
        // The lock is usable again, not wedged behind a leaked reader
        assert_eq!(lock.write_timeout(0, Duration::from_millis(50), |v| *v += 1).await, Ok(()));
    }
}
