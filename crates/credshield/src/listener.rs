//! Background listeners for dismissal and lock signals.
//!
//! Each listener runs as a task on the coordinator's runtime and is owned
//! through a [`ListenerRegistration`]. Dropping or unregistering the
//! registration aborts the task, so no listener outlives the session that
//! registered it.

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::notify::Dismissal;

/// Ownership of a running listener task.
#[derive(Debug)]
pub struct ListenerRegistration {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl ListenerRegistration {
    fn new(name: &'static str, task: JoinHandle<()>) -> Self {
        Self {
            name,
            task: Some(task),
        }
    }

    /// Listener name (for logging).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the listener task is still running.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the listener.
    pub fn unregister(&mut self) {
        if let Some(task) = self.task.take() {
            trace!(listener = self.name, "Unregistering listener");
            task.abort();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Forward every dismissal from `rx` to `on_dismiss` until unregistered.
pub fn spawn_dismissal_listener<F>(
    runtime: &Handle,
    mut rx: broadcast::Receiver<Dismissal>,
    on_dismiss: F,
) -> ListenerRegistration
where
    F: Fn(Dismissal) + Send + 'static,
{
    let task = runtime.spawn(async move {
        loop {
            match rx.recv().await {
                Ok(dismissal) => on_dismiss(dismissal),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Dismissal listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Dismissal source closed");
                    return;
                }
            }
        }
    });
    ListenerRegistration::new("dismissal", task)
}

/// Call `on_lock` once the lock state in `rx` becomes `true`.
///
/// Fires immediately if the store is already locked.
pub fn spawn_lock_listener<F>(
    runtime: &Handle,
    mut rx: watch::Receiver<bool>,
    on_lock: F,
) -> ListenerRegistration
where
    F: FnOnce() + Send + 'static,
{
    let task = runtime.spawn(async move {
        loop {
            if *rx.borrow_and_update() {
                on_lock();
                return;
            }
            if rx.changed().await.is_err() {
                debug!("Lock source closed");
                return;
            }
        }
    });
    ListenerRegistration::new("lock", task)
}
