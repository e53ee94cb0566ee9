//! Session
//!
//! The session owns the native front door, the merged option map, and the
//! event dispatcher. Native-originated events enter through the callback
//! bridge registered at connect time and are handed to the dispatcher, so
//! handler code never runs on the native callback thread.

use crate::container::PlaylistContainer;
use crate::dispatch::{EventDispatcher, SessionCallbacks, WeakDispatcher};
use crate::options::{self, merge_defaults};
use chorus_core::native::{Native, NativeApi, NativeCallbackBridge, NativeHandle};
use chorus_core::{Result, SessionEvent, Track};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Worker threads the session's dispatcher starts with
const DISPATCH_WORKERS: usize = 2;

/// An authenticated connection to the Chorus service.
///
/// The host drives the session by calling [`process_events`] repeatedly,
/// using the returned hint as the delay before the next call. Calling more
/// often than the hint is harmless but wasteful; calling less often delays
/// native housekeeping without causing errors.
///
/// [`process_events`]: Session::process_events
pub struct Session {
    native: Native,
    options: Map<String, Value>,
    dispatcher: EventDispatcher,
    callbacks: Arc<dyn SessionCallbacks>,
}

struct CallbackBridge {
    dispatcher: WeakDispatcher,
    callbacks: Arc<dyn SessionCallbacks>,
}

impl NativeCallbackBridge for CallbackBridge {
    fn event(&self, event: SessionEvent) {
        // Called on the native callback thread; hand off immediately. The
        // native side can hold this bridge past the session's lifetime, so
        // only a weak handle lives here: once the session is gone the pool
        // shuts down and late events have no receiver.
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.fire(Arc::clone(&self.callbacks), event);
        }
    }
}

impl Session {
    /// Connect to the native library.
    ///
    /// Merges `overrides` into the default options (unknown keys pass
    /// through) and registers the callback bridge that routes native events
    /// to `callbacks` via the dispatcher.
    pub fn connect(
        api: Box<dyn NativeApi>,
        overrides: &Map<String, Value>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Self {
        let options = merge_defaults(overrides);
        let native = Native::new(api);
        let dispatcher = EventDispatcher::new(DISPATCH_WORKERS);

        let bridge = Arc::new(CallbackBridge {
            dispatcher: dispatcher.downgrade(),
            callbacks: Arc::clone(&callbacks),
        });
        native.call(|api| api.session_set_callback_bridge(bridge));

        debug!(
            user_agent = options::user_agent(&options),
            settings_path = options::settings_path(&options),
            "session connected"
        );
        Self {
            native,
            options,
            dispatcher,
            callbacks,
        }
    }

    /// Run one iteration of the native event loop.
    ///
    /// Makes exactly one native event-processing call and returns its
    /// timeout hint: the suggested delay in milliseconds before the next
    /// invocation.
    pub fn process_events(&self) -> Result<u64> {
        let timeout_ms = self.native.call(|api| api.session_process_events())?;
        trace!(timeout_ms, "processed native events");
        Ok(timeout_ms)
    }

    /// Start a login attempt; completion arrives as
    /// [`SessionCallbacks::logged_in`]
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        debug!(username, "logging in");
        self.native
            .call(|api| api.session_login(username, password))
    }

    /// Whether a login is currently active
    pub fn logged_in(&self) -> bool {
        self.native.call(|api| api.session_logged_in())
    }

    /// Log out.
    ///
    /// Checks the login state first: calling this while already logged out
    /// is a no-op, never an error.
    pub fn logout(&self) -> Result<()> {
        if !self.logged_in() {
            debug!("logout requested while logged out, ignoring");
            return Ok(());
        }
        debug!("logging out");
        self.native.call(|api| api.session_logout())
    }

    /// The merged option map this session was created with
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Star a track for the logged-in user
    pub fn star(&self, track: &Track) -> Result<()> {
        track.set_starred(true)
    }

    /// Unstar a track for the logged-in user
    pub fn unstar(&self, track: &Track) -> Result<()> {
        track.set_starred(false)
    }

    /// The logged-in user's root playlist container
    pub fn playlist_container(&self) -> Result<PlaylistContainer> {
        let raw = self.native.call(|api| api.session_playlist_container())?;
        Ok(PlaylistContainer::from_handle(NativeHandle::adopt(
            self.native.clone(),
            raw,
        )?))
    }

    /// Fire an event from host code to this session's callbacks.
    ///
    /// Travels the same dispatch path as native-originated events: the
    /// handler runs on a worker thread and this call does not wait for it.
    pub fn fire(&self, event: SessionEvent) {
        self.dispatcher.fire(Arc::clone(&self.callbacks), event);
    }

    /// The native front door, for constructing catalog objects from links
    pub fn native(&self) -> &Native {
        &self.native
    }
}
