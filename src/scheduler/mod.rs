//! Suspension points between the tree engine and the host event loop.
//!
//! Engine operations are plain futures. They suspend in exactly two places:
//! while a blocking filesystem call runs off-thread ([`offload`]), and right
//! after committing a visible tree change ([`Host::yield_now`]).

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The host side of the cooperative contract.
pub trait Host {
    /// Gives the event loop a chance to run other tasks, e.g. a repaint.
    async fn yield_now(&self);
}

/// Host backed by the compio runtime the binary runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompioHost;

impl Host for CompioHost {
    async fn yield_now(&self) {
        YieldNow { yielded: false }.await
    }
}

impl<H: Host> Host for &H {
    async fn yield_now(&self) {
        (**self).yield_now().await
    }
}

/// Pending exactly once, waking itself so the runtime reschedules it after
/// everything already queued.
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Runs a blocking filesystem call on the runtime's blocking pool.
pub async fn offload<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match compio::runtime::spawn_blocking(f).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("blocking filesystem call panicked")),
    }
}
