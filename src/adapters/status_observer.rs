//! Response status capture for logging.
//!
//! [`StatusObserver`] wraps any response-producing `tower::Service` and
//! records the status of the response it produces. Headers and body are
//! handed back untouched. The recorded value is meant for logging once the
//! call has completed and must not drive routing.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU16, Ordering},
    },
    task::{Context, Poll},
};

use futures_util::future::{BoxFuture, FutureExt};
use http::{Response, StatusCode};
use tower::{Layer, Service};

/// Read side of a [`StatusObserver`].
#[derive(Debug, Clone, Default)]
pub struct ObservedStatus(Arc<AtomicU16>);

impl ObservedStatus {
    /// The captured status, or `None` if the wrapped service has not produced
    /// a response (yet, or because it failed).
    pub fn get(&self) -> Option<StatusCode> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    fn record(&self, status: StatusCode) {
        self.0.store(status.as_u16(), Ordering::Release);
    }
}

/// Service decorator capturing the response status of `S`.
#[derive(Debug, Clone)]
pub struct StatusObserver<S> {
    inner: S,
    status: ObservedStatus,
}

impl<S> StatusObserver<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            status: ObservedStatus::default(),
        }
    }

    /// Handle for reading the captured status after the call completes.
    pub fn status(&self) -> ObservedStatus {
        self.status.clone()
    }
}

impl<S, Req, B> Service<Req> for StatusObserver<S>
where
    S: Service<Req, Response = Response<B>>,
    S::Future: Send + 'static,
{
    type Response = Response<B>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response<B>, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let status = self.status.clone();
        self.inner
            .call(req)
            .map(move |result| {
                if let Ok(response) = &result {
                    status.record(response.status());
                }
                result
            })
            .boxed()
    }
}

/// Layer form of [`StatusObserver`] sharing one [`ObservedStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusObserverLayer {
    status: ObservedStatus,
}

impl StatusObserverLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ObservedStatus {
        self.status.clone()
    }
}

impl<S> Layer<S> for StatusObserverLayer {
    type Service = StatusObserver<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatusObserver {
            inner,
            status: self.status.clone(),
        }
    }
}
