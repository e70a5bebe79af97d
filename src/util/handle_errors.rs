//! Typed error dispatch: route an error code through a list of
//! `(matcher, handler)` pairs, falling back to a process-wide default
//! handler for anything unmatched.

use std::sync::OnceLock;
use std::sync::Mutex;

use crate::error::MemConError;
use crate::location::Location;

/// Matches one error, a set of errors, or acts as a catch-all. A catch-all
/// matcher is only valid as the last entry passed to [`handle_errors`].
pub enum Matcher<'a> {
    One(&'a MemConError),
    Many(&'a [MemConError]),
    Else,
}

impl<'a> Matcher<'a> {
    fn matches(&self, error: &MemConError) -> bool {
        match self {
            Matcher::One(e) => *e == *error,
            Matcher::Many(es) => es.iter().any(|e| e == error),
            Matcher::Else => true,
        }
    }
}

type DefaultHandler = Box<dyn Fn(&MemConError, Location) + Send + Sync>;

fn default_handler_slot() -> &'static Mutex<DefaultHandler> {
    static SLOT: OnceLock<Mutex<DefaultHandler>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(Box::new(abort_with_message)))
}

fn abort_with_message(error: &MemConError, location: Location) {
    panic!("unhandled error at {location}: {error}");
}

/// Replaces the process-wide default handler invoked by [`handle_errors`]
/// when no matcher in the call matched. There is exactly one such global,
/// set once during initialization — the only process-wide mutable state
/// this crate keeps, besides the cached OS process id used by loggers.
pub fn set_default_error_handler(handler: impl Fn(&MemConError, Location) + Send + Sync + 'static) {
    *default_handler_slot().lock().unwrap() = Box::new(handler);
}

/// Dispatches `error` through `arms`, an ordered list of `(matcher,
/// handler)` pairs; the first matching arm's handler runs and dispatch
/// stops. If no arm matches, the process-wide default handler runs.
#[track_caller]
pub fn handle_errors(error: &MemConError, arms: &[(Matcher<'_>, &dyn Fn(&MemConError))]) {
    let location = Location::caller();
    for (matcher, handler) in arms {
        if matcher.matches(error) {
            handler(error);
            return;
        }
    }
    let guard = default_handler_slot().lock().unwrap();
    guard(error, location);
}
