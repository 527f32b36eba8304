// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Debounced hardware hot-plug reconnect (spec section 6): JACK fires a port
//! or client registration notification per port, often several in a burst
//! when a USB MIDI interface with multiple ports appears. We wait ~300ms of
//! quiet before reconciling the device list, cancelling any pending
//! reconcile a fresh notification arrives during.

use std::thread;
use std::time::Duration;

use tracing::info;

use crate::playsync::CancelHandle;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Debounces a burst of hot-plug notifications down to a single reconcile
/// call. `on_reconcile` runs on a background thread once `DEBOUNCE` has
/// passed with no further [`HotplugDebouncer::notify`] call.
pub struct HotplugDebouncer {
    pending: Option<CancelHandle>,
}

impl HotplugDebouncer {
    pub fn new() -> HotplugDebouncer {
        HotplugDebouncer { pending: None }
    }

    /// Call on every JACK port/client registration callback. Cancels any
    /// in-flight debounce wait and starts a new one.
    pub fn notify<F>(&mut self, on_reconcile: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }

        let handle = CancelHandle::new();
        self.pending = Some(handle.clone());

        thread::spawn(move || {
            thread::sleep(DEBOUNCE);
            if handle.is_cancelled() {
                return;
            }
            handle.expire();
            info!("hot-plug debounce elapsed, reconciling devices");
            on_reconcile();
        });
    }
}

impl Default for HotplugDebouncer {
    fn default() -> HotplugDebouncer {
        HotplugDebouncer::new()
    }
}
