//! Event dispatch
//!
//! The native library invokes the bindings from its own internal thread
//! during event processing. A handler that ran synchronously on that thread
//! and called back into the bindings (reading catalog data in response to a
//! notification is the expected pattern) would re-enter non-reentrant native
//! code. The dispatcher therefore hands every event to a small worker pool:
//! the thread that runs a handler is never the thread that fired it, and
//! never the native callback thread.
//!
//! No ordering is guaranteed between separately fired events; handlers race
//! unless the host serializes itself.

use chorus_core::{NativeError, SessionEvent};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use tracing::error;

/// Handler slots for session events, one method per recognized event.
///
/// Every method has a default no-op body; a target that does not override an
/// event silently ignores it. All methods run on dispatcher worker threads
/// and may freely call back into the bindings.
pub trait SessionCallbacks: Send + Sync {
    /// A login attempt finished
    fn logged_in(&self, _result: Result<(), NativeError>) {}

    /// The session was logged out
    fn logged_out(&self) {}

    /// Metadata for one or more loaded objects changed
    fn metadata_updated(&self) {}

    /// The connection was lost
    fn connection_error(&self, _error: NativeError) {}

    /// The service wants to show a message to the user
    fn message_to_user(&self, _message: &str) {}

    /// The native library wants `process_events` called soon
    fn notify_main_thread(&self) {}

    /// Playback was taken over by another session on the same account
    fn play_token_lost(&self) {}

    /// A log line from inside the native library
    fn log_message(&self, _message: &str) {}

    /// The current track finished playing
    fn end_of_track(&self) {}

    /// A streaming failure occurred
    fn streaming_error(&self, _error: NativeError) {}

    /// Information about the logged-in user changed
    fn userinfo_updated(&self) {}

    /// The service requested playback to start
    fn start_playback(&self) {}

    /// The service requested playback to stop
    fn stop_playback(&self) {}
}

/// Route one event to the matching callback slot
fn deliver(event: &SessionEvent, target: &dyn SessionCallbacks) {
    match event {
        SessionEvent::LoggedIn { error } => match error {
            Some(error) => target.logged_in(Err(*error)),
            None => target.logged_in(Ok(())),
        },
        SessionEvent::LoggedOut => target.logged_out(),
        SessionEvent::MetadataUpdated => target.metadata_updated(),
        SessionEvent::ConnectionError { error } => target.connection_error(*error),
        SessionEvent::MessageToUser { message } => target.message_to_user(message),
        SessionEvent::NotifyMainThread => target.notify_main_thread(),
        SessionEvent::PlayTokenLost => target.play_token_lost(),
        SessionEvent::LogMessage { message } => target.log_message(message),
        SessionEvent::EndOfTrack => target.end_of_track(),
        SessionEvent::StreamingError { error } => target.streaming_error(*error),
        SessionEvent::UserinfoUpdated => target.userinfo_updated(),
        SessionEvent::StartPlayback => target.start_playback(),
        SessionEvent::StopPlayback => target.stop_playback(),
    }
}

/// Sink invoked when a handler panics, with the event and the panic message
pub type ErrorSink = Arc<dyn Fn(&SessionEvent, &str) + Send + Sync>;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool that executes session event handlers away from the thread
/// that fired them.
///
/// [`fire`](Self::fire) enqueues and returns immediately; it never waits for
/// the handler. Handler panics are caught and forwarded to the error sink;
/// they are not observable to the caller of `fire` and do not take down the
/// pool. Cloning shares the same pool; dropping the last clone shuts the
/// queue and joins the workers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    error_sink: ErrorSink,
}

impl EventDispatcher {
    /// Pool that reports handler panics through `tracing::error!`
    pub fn new(workers: usize) -> Self {
        Self::with_error_sink(
            workers,
            Arc::new(|event, message| {
                error!(?event, message, "session event handler panicked");
            }),
        )
    }

    /// Pool with a custom sink for handler panics
    pub fn with_error_sink(workers: usize, error_sink: ErrorSink) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || worker_loop(&receiver))
            })
            .collect();

        Self {
            inner: Arc::new(DispatcherInner {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                error_sink,
            }),
        }
    }

    /// Hand an event to the pool for delivery to `target`.
    ///
    /// Returns as soon as the event is queued. The handler runs on a worker
    /// thread, never on the calling thread.
    pub fn fire(&self, target: Arc<dyn SessionCallbacks>, event: SessionEvent) {
        let sink = Arc::clone(&self.inner.error_sink);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| deliver(&event, &*target)));
            if let Err(payload) = outcome {
                sink(&event, &panic_message(&payload));
            }
        });

        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            // The receiver outlives the sender; send cannot fail here.
            let _ = sender.send(job);
        }
    }

    /// Handle on this pool that does not keep it alive.
    ///
    /// For callers registered with the native library and held there
    /// indefinitely: the pool still shuts down and joins its workers when the
    /// last [`EventDispatcher`] is dropped, even while such a handle remains.
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to an [`EventDispatcher`]
#[derive(Clone)]
pub struct WeakDispatcher {
    inner: Weak<DispatcherInner>,
}

impl WeakDispatcher {
    /// The pool, if any owning handle still exists
    pub fn upgrade(&self) -> Option<EventDispatcher> {
        self.inner.upgrade().map(|inner| EventDispatcher { inner })
    }
}

fn worker_loop(receiver: &Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .recv();
        match job {
            Ok(job) => job(),
            // Channel closed: the dispatcher is shutting down.
            Err(_) => break,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if let Ok(mut workers) = self.workers.lock() {
            for worker in workers.drain(..) {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::thread::ThreadId;

    struct Recorder {
        sender: Mutex<Sender<ThreadId>>,
    }

    impl SessionCallbacks for Recorder {
        fn end_of_track(&self) {
            let sender = self.sender.lock().unwrap();
            sender.send(thread::current().id()).unwrap();
        }
    }

    #[test]
    fn handler_runs_on_a_different_thread() {
        let dispatcher = EventDispatcher::new(2);
        let (sender, receiver) = channel();
        let target = Arc::new(Recorder {
            sender: Mutex::new(sender),
        });

        dispatcher.fire(target, SessionEvent::EndOfTrack);

        let handler_thread = receiver.recv().unwrap();
        assert_ne!(handler_thread, thread::current().id());
    }

    #[test]
    fn fire_returns_before_the_handler_finishes() {
        struct Blocker {
            release: Mutex<Receiver<()>>,
            done: Mutex<Sender<()>>,
        }

        impl SessionCallbacks for Blocker {
            fn end_of_track(&self) {
                // Blocks until the test, after fire has returned, releases us.
                self.release.lock().unwrap().recv().unwrap();
                self.done.lock().unwrap().send(()).unwrap();
            }
        }

        let dispatcher = EventDispatcher::new(1);
        let (release_tx, release_rx) = channel();
        let (done_tx, done_rx) = channel();
        let target = Arc::new(Blocker {
            release: Mutex::new(release_rx),
            done: Mutex::new(done_tx),
        });

        dispatcher.fire(target, SessionEvent::EndOfTrack);

        // fire returned while the handler is still blocked
        release_tx.send(()).unwrap();
        done_rx.recv().unwrap();
    }

    #[test]
    fn panicking_handler_reaches_the_sink_and_pool_survives() {
        struct Panicker;
        impl SessionCallbacks for Panicker {
            fn play_token_lost(&self) {
                panic!("boom");
            }
        }

        let (sink_tx, sink_rx) = channel();
        let sink_tx = Mutex::new(sink_tx);
        let dispatcher = EventDispatcher::with_error_sink(
            1,
            Arc::new(move |event, message| {
                let sender = sink_tx.lock().unwrap();
                sender.send((event.clone(), message.to_string())).unwrap();
            }),
        );

        dispatcher.fire(Arc::new(Panicker), SessionEvent::PlayTokenLost);
        let (event, message) = sink_rx.recv().unwrap();
        assert_eq!(event, SessionEvent::PlayTokenLost);
        assert_eq!(message, "boom");

        // The worker is still alive and keeps delivering.
        let (sender, receiver) = channel();
        let target = Arc::new(Recorder {
            sender: Mutex::new(sender),
        });
        dispatcher.fire(target, SessionEvent::EndOfTrack);
        receiver.recv().unwrap();
    }

    #[test]
    fn weak_handles_do_not_keep_the_pool_alive() {
        let dispatcher = EventDispatcher::new(1);
        let weak = dispatcher.downgrade();
        assert!(weak.upgrade().is_some());

        // Dropping the owning handle shuts the pool down despite the weak
        // handle still existing.
        drop(dispatcher);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn unhandled_events_are_silent_no_ops() {
        struct Indifferent;
        impl SessionCallbacks for Indifferent {}

        let dispatcher = EventDispatcher::new(1);
        dispatcher.fire(Arc::new(Indifferent), SessionEvent::MetadataUpdated);
        dispatcher.fire(
            Arc::new(Indifferent),
            SessionEvent::LogMessage {
                message: "noisy".to_string(),
            },
        );
        // Dropping joins the workers; nothing must have panicked.
        drop(dispatcher);
    }
}
