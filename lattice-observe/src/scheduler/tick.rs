//! Awaitable flush.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Resolves once the flush it was scheduled into reaches it.
///
/// Everything queued before the tick has run by then. If the scheduler is
/// dropped with the tick still pending, the tick resolves anyway.
#[must_use = "a tick does nothing unless awaited"]
pub struct Tick {
    rx: oneshot::Receiver<()>,
}

impl Tick {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx }
    }
}

impl Future for Tick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

impl std::fmt::Debug for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tick").finish_non_exhaustive()
    }
}
