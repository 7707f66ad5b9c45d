//! Inbound Notification/Indication handling (spec.md §4.2 "Notify / Indicate (inbound)").
//!
//! This server is itself the peer receiving `Handle Value Notification`/`Indication` PDUs (eg.
//! when acting as a GATT client's transport), not the one emitting them, so this module only
//! covers delivering an inbound payload to a registered application sink, plus replying with a
//! Confirmation for indications.

use super::Handle;

/// Opaque identifier of the connection a notification/indication arrived on.
///
/// L2CAP connection management is out of scope (§1); this core treats the handle as an opaque
/// token supplied by the caller.
pub type ConnectionHandle = u16;

/// A process-wide callback receiving inbound notifications and indications.
///
/// Returns `0` to accept, nonzero to abort the handler — for an Indicate, a nonzero return also
/// suppresses the Confirmation PDU (spec.md §4.2).
pub type NotificationSink = Box<dyn Fn(ConnectionHandle, Handle, &[u8]) -> u8 + Send>;

/// Dispatches an inbound Notify/Indicate payload to `sink`, if one is registered.
///
/// Returns whether the caller should proceed to emit a Confirmation (always `false` for
/// Notify; for Indicate, `true` unless the sink aborted).
pub fn deliver(
    sink: Option<&NotificationSink>,
    conn: ConnectionHandle,
    handle: Handle,
    payload: &[u8],
    is_indication: bool,
) -> bool {
    let aborted = match sink {
        Some(sink) => sink(conn, handle, payload) != 0,
        None => false,
    };

    is_indication && !aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    #[test]
    fn notify_never_confirms() {
        assert!(!deliver(None, 1, Handle::from_raw(5), b"x", false));
    }

    #[test]
    fn indicate_confirms_unless_sink_aborts() {
        let sink: NotificationSink = Box::new(|_, _, _| 0);
        assert!(deliver(Some(&sink), 1, Handle::from_raw(5), b"x", true));

        let sink: NotificationSink = Box::new(|_, _, _| 1);
        assert!(!deliver(Some(&sink), 1, Handle::from_raw(5), b"x", true));
    }

    #[test]
    fn sink_receives_payload() {
        static SEEN: AtomicU8 = AtomicU8::new(0);
        let sink: NotificationSink = Box::new(|_, _, payload| {
            SEEN.store(payload[0], Ordering::SeqCst);
            0
        });
        deliver(Some(&sink), 1, Handle::from_raw(5), &[42], false);
        assert_eq!(SEEN.load(Ordering::SeqCst), 42);
    }
}
