//! Scoped stretch-mode suspension for chat-box captures.
//!
//! Stretched mode scales the frame to the window, so widget bounds no longer
//! line up with raw frame pixels. A chat-box crop turns it off first and puts
//! it back once the crop is done. Overlapping captures share one
//! `StretchSuspender`: stretch stays off until the last guard is dropped.

use crate::host::GameClient;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct SuspendState {
    holders: usize,
    restore: bool,
}

/// Counts outstanding suspensions for one client.
pub struct StretchSuspender {
    client: Arc<dyn GameClient>,
    state: Mutex<SuspendState>,
}

impl StretchSuspender {
    pub fn new(client: Arc<dyn GameClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            state: Mutex::new(SuspendState::default()),
        })
    }

    /// Turns stretched mode off if it is on and holds it off until the
    /// returned guard, and every other outstanding guard, is dropped.
    pub fn suspend(self: &Arc<Self>) -> StretchGuard {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if self.client.is_stretched_enabled() {
            self.client.set_stretched_enabled(false);
            state.restore = true;
            log::debug!("[CAPTURE] Stretched mode suspended for chat-box capture");
        }
        state.holders += 1;

        StretchGuard {
            owner: Some(Arc::clone(self)),
        }
    }

    /// Number of captures currently holding stretch off.
    pub fn holders(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).holders
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.holders = state.holders.saturating_sub(1);
        if state.holders == 0 && state.restore {
            state.restore = false;
            self.client.set_stretched_enabled(true);
            log::debug!("[CAPTURE] Stretched mode restored");
        }
    }
}

/// One capture's hold on a `StretchSuspender`.
#[must_use = "stretched mode is restored when the last guard is dropped"]
pub struct StretchGuard {
    owner: Option<Arc<StretchSuspender>>,
}

impl StretchGuard {
    /// A guard that holds nothing.
    pub fn inactive() -> Self {
        Self { owner: None }
    }

    pub fn is_active(&self) -> bool {
        self.owner.is_some()
    }
}

impl Drop for StretchGuard {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.release();
        }
    }
}
