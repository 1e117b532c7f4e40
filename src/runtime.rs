use std::future::Future;

use anyhow::Context as _;
use once_cell::sync::OnceCell;
use tokio::{
    runtime::Handle,
    sync::oneshot::{self, Receiver},
};

static HANDLE: OnceCell<Handle> = OnceCell::new();

/// Starts the shared runtime on a background thread.
///
/// The returned closure stops it and waits for the thread to exit.
pub fn start() -> anyhow::Result<impl FnOnce()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("tiertagger-worker")
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    HANDLE
        .set(rt.handle().clone())
        .map_err(|_| anyhow::anyhow!("runtime was already started"))?;

    let (tx, rx) = oneshot::channel::<()>();
    let thread = std::thread::spawn(move || {
        rt.block_on(async move {
            tokio::select! {
                _ = std::future::pending::<()>() => {}
                _ = rx => {}
            }
        });
    });

    Ok(move || {
        drop(tx);
        let _ = thread.join();
    })
}

// prefer the runtime we're already on, so tests can drive their own
pub fn handle() -> Option<Handle> {
    Handle::try_current()
        .ok()
        .or_else(|| HANDLE.get().cloned())
}

pub fn spawn<T>(fut: impl Future<Output = T> + Send + 'static) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let Some(handle) = handle() else {
        tracing::error!("no async runtime available, dropping task");
        return rx;
    };

    handle.spawn(async move {
        let res = fut.await;
        let _ = tx.send(res);
    });
    rx
}
