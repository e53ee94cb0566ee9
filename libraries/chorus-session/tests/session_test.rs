//! Session integration tests
//!
//! Session lifecycle against the fake native library: option merging,
//! event-loop timeout relay, idempotent logout, and the callback path from
//! the native callback thread to handlers on dispatcher threads.

use chorus_core::native::fixtures::FakeNative;
use chorus_core::{NativeError, SessionEvent};
use chorus_session::{Session, SessionCallbacks};
use serde_json::{Map, Value};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::ThreadId;

struct NoCallbacks;
impl SessionCallbacks for NoCallbacks {}

fn connect(fake: &FakeNative) -> Session {
    Session::connect(Box::new(fake.clone()), &Map::new(), Arc::new(NoCallbacks))
}

#[test]
fn options_are_merged_with_defaults() {
    let fake = FakeNative::new();
    let mut overrides = Map::new();
    overrides.insert("user_agent".to_string(), Value::from("Cow"));
    overrides.insert("proxy".to_string(), Value::from("socks5://localhost"));

    let session = Session::connect(Box::new(fake.clone()), &overrides, Arc::new(NoCallbacks));
    let options = session.options();

    assert_eq!(options["user_agent"], Value::from("Cow"));
    assert_eq!(options["proxy"], Value::from("socks5://localhost"));
    assert_eq!(options["load_playlists"], Value::from(true));
    assert_eq!(options["compress_playlists"], Value::from(true));
    assert_eq!(options["cache_playlist_metadata"], Value::from(true));
}

#[test]
fn process_events_relays_the_native_timeout_hint() {
    let fake = FakeNative::new();
    fake.set_process_timeout(1337);
    let session = connect(&fake);

    assert_eq!(session.process_events().unwrap(), 1337);

    fake.set_process_timeout(0);
    assert_eq!(session.process_events().unwrap(), 0);
}

#[test]
fn logout_checks_login_state_first() {
    let fake = FakeNative::new();
    let session = connect(&fake);

    // The fake errors on a native logout without a login, so a passing
    // no-op here proves the state check happens first.
    assert!(!session.logged_in());
    session.logout().unwrap();

    session.login("alice", "hunter2").unwrap();
    assert!(session.logged_in());
    session.logout().unwrap();
    assert!(!session.logged_in());

    // Still idempotent after a real logout.
    session.logout().unwrap();
}

struct Recorder {
    sender: Mutex<Sender<(ThreadId, String, SessionEvent)>>,
}

impl Recorder {
    fn record(&self, event: SessionEvent) {
        let current = thread::current();
        let name = current.name().unwrap_or("").to_string();
        let sender = self.sender.lock().unwrap();
        sender.send((current.id(), name, event)).unwrap();
    }
}

impl SessionCallbacks for Recorder {
    fn end_of_track(&self) {
        self.record(SessionEvent::EndOfTrack);
    }

    fn connection_error(&self, error: NativeError) {
        self.record(SessionEvent::ConnectionError { error });
    }

    fn logged_in(&self, result: Result<(), NativeError>) {
        self.record(SessionEvent::LoggedIn {
            error: result.err(),
        });
    }
}

#[test]
fn native_events_reach_handlers_off_the_callback_thread() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let fake = FakeNative::new();
    let (sender, receiver) = channel();
    let callbacks = Arc::new(Recorder {
        sender: Mutex::new(sender),
    });
    let _session = Session::connect(Box::new(fake.clone()), &Map::new(), callbacks);

    fake.emit_from_callback_thread(SessionEvent::EndOfTrack);
    fake.emit_from_callback_thread(SessionEvent::ConnectionError {
        error: NativeError::NetworkDisabled,
    });

    let mut received = vec![receiver.recv().unwrap(), receiver.recv().unwrap()];
    // No cross-fire ordering guarantee; sort for assertion.
    received.sort_by_key(|(_, _, event)| format!("{event:?}"));

    for (thread_id, thread_name, _) in &received {
        // Not the test thread, and not the native callback thread.
        assert_ne!(*thread_id, thread::current().id());
        assert_ne!(thread_name, "native-callback");
    }

    let events: Vec<_> = received.into_iter().map(|(_, _, event)| event).collect();
    assert!(events.contains(&SessionEvent::EndOfTrack));
    assert!(events.contains(&SessionEvent::ConnectionError {
        error: NativeError::NetworkDisabled,
    }));
}

#[test]
fn host_fired_events_travel_the_same_path() {
    let fake = FakeNative::new();
    let (sender, receiver) = channel();
    let callbacks = Arc::new(Recorder {
        sender: Mutex::new(sender),
    });
    let session = Session::connect(Box::new(fake.clone()), &Map::new(), callbacks);

    session.fire(SessionEvent::LoggedIn {
        error: Some(NativeError::BadCredentials),
    });

    let (thread_id, _, event) = receiver.recv().unwrap();
    assert_ne!(thread_id, thread::current().id());
    assert_eq!(
        event,
        SessionEvent::LoggedIn {
            error: Some(NativeError::BadCredentials),
        }
    );
}

#[test]
fn dropping_the_session_stops_event_delivery_and_joins_the_pool() {
    let fake = FakeNative::new();
    let (sender, receiver) = channel();
    let callbacks = Arc::new(Recorder {
        sender: Mutex::new(sender),
    });
    let session = Session::connect(Box::new(fake.clone()), &Map::new(), callbacks);

    session.fire(SessionEvent::EndOfTrack);
    receiver.recv().unwrap();

    // The fake still holds the bridge past this point. The drop must not
    // hang on the worker threads, and late native events fall on the floor.
    drop(session);
    fake.emit_from_callback_thread(SessionEvent::EndOfTrack);
    assert!(receiver.try_recv().is_err());
}

#[test]
fn catalog_objects_are_reachable_through_the_session_native() {
    use chorus_core::{Link, LinkType, Track};

    let fake = FakeNative::new();
    fake.seed_track("t1", "Song");
    let session = connect(&fake);

    let track = Track::from_link(session.native(), &Link::new(LinkType::Track, "t1")).unwrap();
    assert_eq!(track.name(), "Song");

    session.star(&track).unwrap();
    assert!(track.starred());
    session.unstar(&track).unwrap();
    assert!(!track.starred());
}
