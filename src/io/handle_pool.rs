//! Bounded pool of checked-out TIFF reader handles.
//!
//! Grounded in the same checkout/return shape as
//! [`crate::slide::registry::SlideRegistry`]'s singleflight guard, but a
//! level below it: where the slide registry caches *parsed pyramid
//! metadata* keyed by slide id, this pool bounds how many read-path call
//! sites can hold a live handle to one slide's pyramid at once.
//!
//! Because this crate's `GenericTiffReader`/`SvsReader` are parsed once and
//! held immutably behind an `Arc` (there is no mutable libtiff-style cursor
//! to serialize access to), a checked-out handle here is an identity token
//! rather than exclusive ownership of mutable state — multiple checkouts can
//! point at the same underlying `Arc<T>`. The pool still bounds and tracks
//! concurrency the way a real handle cache would, which is what lets callers
//! reason about `outstanding` and the idle-handle cap the same way.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

/// Maximum number of idle handles kept resident per pool before the oldest is
/// dropped to make room for a returned one.
pub const HANDLE_CACHE_MAX: usize = 32;

struct Inner<T> {
    idle: Mutex<VecDeque<Arc<T>>>,
    outstanding: AtomicUsize,
    max_idle: usize,
}

/// A LIFO pool of handles to some shared, immutable resource `T`.
///
/// `checkout` hands out a clone of an idle handle if one is available,
/// otherwise calls the supplied factory to build a new one. Handles are
/// returned to the pool automatically when their [`HandlePoolGuard`] drops.
pub struct TiffHandlePool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TiffHandlePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> TiffHandlePool<T> {
    pub fn new() -> Self {
        Self::with_max_idle(HANDLE_CACHE_MAX)
    }

    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                idle: Mutex::new(VecDeque::new()),
                outstanding: AtomicUsize::new(0),
                max_idle,
            }),
        }
    }

    /// Check out a handle, reusing the most recently returned idle one (LIFO,
    /// favoring cache-warm handles) or building a fresh one via `factory`.
    pub async fn checkout<F>(&self, factory: F) -> Arc<T>
    where
        F: FnOnce() -> Arc<T>,
    {
        let handle = {
            let mut idle = self.inner.idle.lock().await;
            idle.pop_back()
        };
        let handle = handle.unwrap_or_else(factory);
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        handle
    }

    /// Check out a handle wrapped in an RAII guard that auto-returns it on
    /// drop.
    pub async fn checkout_guarded<F>(&self, factory: F) -> HandlePoolGuard<T>
    where
        F: FnOnce() -> Arc<T>,
    {
        let handle = self.checkout(factory).await;
        HandlePoolGuard {
            pool: self.clone(),
            handle: Some(handle),
        }
    }

    /// Return a handle to the idle pool. If the idle pool is already at
    /// `HANDLE_CACHE_MAX`, the oldest idle handle is dropped to make room —
    /// this keeps the pool bounded rather than growing without limit under
    /// bursty checkout patterns.
    pub async fn return_handle(&self, handle: Arc<T>) {
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
        let mut idle = self.inner.idle.lock().await;
        if idle.len() >= self.inner.max_idle {
            idle.pop_front();
        }
        idle.push_back(handle);
    }

    /// Discard a handle instead of returning it to the idle pool — used when
    /// the handle is known to be bad (e.g. its backing byte source failed).
    pub fn destroy(&self, handle: Arc<T>) {
        drop(handle);
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of handles currently checked out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Number of idle handles currently resident.
    pub async fn idle_count(&self) -> usize {
        self.inner.idle.lock().await.len()
    }
}

impl<T> Default for TiffHandlePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`TiffHandlePool::checkout_guarded`]. Returns its
/// handle to the pool on drop; call [`HandlePoolGuard::destroy`] instead to
/// discard a handle known to be bad.
pub struct HandlePoolGuard<T> {
    pool: TiffHandlePool<T>,
    handle: Option<Arc<T>>,
}

impl<T> HandlePoolGuard<T> {
    pub fn handle(&self) -> &Arc<T> {
        self.handle.as_ref().expect("handle taken only on drop/destroy")
    }

    /// Discard the handle instead of returning it to the pool.
    pub fn destroy(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.destroy(handle);
        }
    }
}

impl<T> Drop for HandlePoolGuard<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.return_handle(handle).await;
            });
        }
    }
}
