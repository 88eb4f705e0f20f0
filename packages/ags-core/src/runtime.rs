//! Task spawning abstraction.
//!
//! Services that fire work into the background (the action queue worker,
//! transition runs, delayed re-checks, the sync loop) take a [`TaskSpawner`]
//! instead of calling `tokio::spawn` directly, so a host embedding the engine
//! can decide which runtime those tasks land on.

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Implementations must let tasks run to completion even if the spawner
/// itself is dropped.
///
/// # Example
///
/// ```ignore
/// struct MyService<S: TaskSpawner> {
///     spawner: S,
/// }
///
/// impl<S: TaskSpawner> MyService<S> {
///     fn kick(&self) {
///         self.spawner.spawn(async {
///             // Background work here
///         });
///     }
/// }
/// ```
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a detached background task.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based spawner.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
