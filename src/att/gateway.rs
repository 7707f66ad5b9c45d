//! Access Callback Gateway.
//!
//! Mediates every read or write of an attribute's value: it checks the attribute's
//! [`Permissions`](super::Permissions) against the requested [`Operation`], then invokes the
//! attribute's access callback with a freshly built [`AccessContext`].
//!
//! Grounded in NimBLE's unified `ble_att_svr_access_fn` callback (`ble_hs_att.h`): rather than an
//! untyped `(op_code, ctxt)` pair, the closed {Read, Write} capability set is represented as a
//! tagged [`Operation`] enum, per spec.md §9's "Design Notes" guidance.

use super::{pdus::ErrorCode, AttError, Attribute, Handle, Permissions};

/// Which capability a gateway invocation is exercising.
///
/// The callback set is closed: there is no generic "do anything" entry point, only these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A peer is reading the attribute's value.
    Read,
    /// A peer is writing the attribute's value.
    Write,
}

/// The context passed to an attribute's access callback.
///
/// Created fresh on the dispatcher's stack for each callback invocation and discarded
/// immediately after (spec.md §3: "created on the stack of the dispatcher ... discarded after
/// one use").
pub struct AccessContext<'a> {
    /// Which operation is being performed.
    pub operation: Operation,
    /// Byte offset into the attribute's value (nonzero for Read Blob / prepared writes).
    pub offset: u16,
    /// For reads: ignored. For writes: the bytes to write, already assembled by the caller in
    /// the shared scratch buffer (§4.4: "the gateway assumes the caller has already materialised
    /// the full payload").
    pub data: &'a [u8],
}

/// The result of an access callback invocation.
///
/// `Ok` data is `'static` rather than borrowed from the call: a registered attribute's backing
/// storage is expected to live for the program's duration (a global, a leaked buffer, a pointer
/// reached through `cb_arg`), the same assumption NimBLE's `ble_att_svr_access_fn` callbacks make
/// about the buffers they hand back.
pub enum AccessResult {
    /// The operation succeeded. For reads, `data` holds the readable bytes (sliced to `offset`
    /// by the callback); for writes, the slice is ignored and may be empty.
    Ok { data: &'static [u8] },
    /// The operation failed with the given ATT error code.
    Err(ErrorCode),
}

/// Invokes `attr`'s access callback for a peer-initiated operation, having first checked that
/// the attribute's permissions allow it.
///
/// `is_peer` distinguishes a connection-originated access (permission bits enforced) from a
/// purely local one; this core only ever serves peer-initiated requests, so it is always `true`
/// at present, but the parameter documents the distinction made in spec.md §4.4 ("if the
/// operation has an associated peer connection").
pub fn access(
    attr: &Attribute,
    operation: Operation,
    offset: u16,
    data: &[u8],
    is_peer: bool,
) -> Result<&'static [u8], AttError> {
    if is_peer {
        let required = match operation {
            Operation::Read => Permissions::READ,
            Operation::Write => Permissions::WRITE,
        };
        if !attr.permissions.contains(required) {
            let code = match operation {
                Operation::Read => ErrorCode::ReadNotPermitted,
                Operation::Write => ErrorCode::WriteNotPermitted,
            };
            return Err(AttError::new(code, attr.handle));
        }
    }

    let mut ctx = AccessContext {
        operation,
        offset,
        data,
    };

    trace!(
        "ATT access: handle={:?} op={:?} offset={}",
        attr.handle,
        operation,
        offset
    );

    match (attr.access_cb)(&mut ctx, attr.cb_arg) {
        AccessResult::Ok { data } => Ok(data),
        AccessResult::Err(code) => Err(AttError::new(code, attr.handle)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::AttUuid;
    use crate::uuid::Uuid16;

    fn dummy_attr(permissions: Permissions) -> Attribute {
        fn cb(ctx: &mut AccessContext<'_>, _arg: usize) -> AccessResult {
            match ctx.operation {
                Operation::Read => AccessResult::Ok { data: b"hi" },
                Operation::Write => AccessResult::Ok { data: &[] },
            }
        }

        Attribute {
            att_type: AttUuid::from(Uuid16(0x2800)),
            handle: Handle::from_raw(1),
            permissions,
            access_cb: cb,
            cb_arg: 0,
        }
    }

    #[test]
    fn rejects_read_without_permission() {
        let attr = dummy_attr(Permissions::WRITE);
        assert!(access(&attr, Operation::Read, 0, &[], true).is_err());
    }

    #[test]
    fn allows_read_with_permission() {
        let attr = dummy_attr(Permissions::READ);
        assert_eq!(access(&attr, Operation::Read, 0, &[], true).unwrap(), b"hi");
    }

    #[test]
    fn local_access_bypasses_permission_check() {
        let attr = dummy_attr(Permissions::empty());
        assert!(access(&attr, Operation::Read, 0, &[], false).is_ok());
    }
}
