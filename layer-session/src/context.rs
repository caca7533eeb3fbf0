//! Per-connection session context and debounced checkpoints.
//!
//! A [`SessionContext`] lives from "connection open" to "connection close". It
//! owns the [`SessionStore`], the in-memory [`SessionState`] shared by the login
//! flow and the secret-chat lifecycle, and at most one pending write timer.
//!
//! ```rust,no_run
//! use layer_session::{SessionContext, StoreConfig};
//!
//! # async fn demo() -> Result<(), layer_session::StoreError> {
//! let ctx = SessionContext::open(&StoreConfig {
//!     root: "accounts/+15550100".into(),
//!     ..Default::default()
//! })?;
//!
//! ctx.state().await.cursor.pts += 1;
//! ctx.schedule_save();          // coalesced with any other pending save
//! ctx.close().await?;           // flushes what is still pending
//! # Ok(()) }
//! ```

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::errors::StoreError;
use crate::records::SyncCursor;
use crate::store::{SessionState, SessionStore, StoreConfig};

struct ContextInner {
    store:       SessionStore,
    state:       Mutex<SessionState>,
    write_timer: std::sync::Mutex<Option<JoinHandle<()>>>,
    save_delay:  Duration,
}

/// Shared handle to one session. Cheap to clone — internally Arc-wrapped.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

impl SessionContext {
    /// Create the content root if needed and load everything stored in it.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = SessionStore::open(config)?;
        Ok(Self::new(store, config.save_delay))
    }

    /// Wrap an already constructed store (e.g. one over an in-memory backend).
    pub fn new(store: SessionStore, save_delay: Duration) -> Self {
        let state = store.load_all();
        Self {
            inner: Arc::new(ContextInner {
                store,
                state: Mutex::new(state),
                write_timer: std::sync::Mutex::new(None),
                save_delay,
            }),
        }
    }

    pub fn store(&self) -> &SessionStore { &self.inner.store }

    /// Lock the in-memory state.
    pub async fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().await
    }

    /// Record a new update-stream position and schedule a checkpoint.
    pub async fn checkpoint(&self, cursor: SyncCursor) {
        self.state().await.cursor = cursor;
        self.schedule_save();
    }

    /// Schedule a debounced write of the cursor and secret-chat files.
    ///
    /// At most one write is pending per context; calls made while one is
    /// pending are folded into it. Must be called from within a Tokio runtime;
    /// outside of one the write happens immediately if the state is unlocked.
    pub fn schedule_save(&self) {
        let mut timer = self.lock_timer();
        if timer.is_some() {
            tracing::trace!("[layer-session] Save already pending, coalescing");
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let ctx = self.clone();
                *timer = Some(rt.spawn(async move { ctx.run_scheduled_save().await }));
            }
            Err(_) => {
                drop(timer);
                match self.inner.state.try_lock() {
                    Ok(state) => self.write_checkpoint(&state),
                    Err(_) => tracing::warn!("[layer-session] No runtime and state is busy, save skipped"),
                }
            }
        }
    }

    /// Whether a debounced write is waiting to run.
    pub fn has_pending_save(&self) -> bool {
        self.lock_timer().is_some()
    }

    /// Write the credential file right away, bypassing the debounce.
    pub async fn save_credentials_now(&self) -> Result<(), StoreError> {
        let state = self.state().await;
        self.inner.store.save_credentials(&state)
    }

    /// Write the secret-chat file right away, bypassing the debounce.
    pub async fn save_secret_chats_now(&self) -> Result<(), StoreError> {
        let state = self.state().await;
        self.inner.store.save_secret_chats(&state)
    }

    /// Cancel any pending debounced write and perform it now.
    pub async fn flush(&self) -> Result<(), StoreError> {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
        }
        let state = self.state().await;
        self.inner.store.save_cursor(&state)?;
        self.inner.store.save_secret_chats(&state)
    }

    /// Tear the context down, flushing a pending checkpoint if there is one.
    pub async fn close(self) -> Result<(), StoreError> {
        if self.has_pending_save() {
            self.flush().await?;
        }
        Ok(())
    }

    async fn run_scheduled_save(self) {
        tokio::time::sleep(self.inner.save_delay).await;
        let state = self.inner.state.lock().await;
        self.lock_timer().take();
        self.write_checkpoint(&state);
    }

    fn write_checkpoint(&self, state: &SessionState) {
        let store = &self.inner.store;
        if let Err(e) = store.save_cursor(state).and_then(|()| store.save_secret_chats(state)) {
            tracing::warn!("[layer-session] Checkpoint failed ({e}), will retry on next save");
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.write_timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
