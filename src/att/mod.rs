//! Implementation of the Attribute Protocol (ATT) server.
//!
//! ATT is the protocol GATT is built on: it exposes a flat, ordered table of *Attributes*
//! (handle, type UUID, value, permissions) and a request/response wire protocol for discovering
//! and accessing them. This module owns the attribute table, the handle allocator, the
//! permission-checked access gateway, the prepare/execute-write two-phase commit engine, MTU
//! negotiation and framing, and the request dispatcher that ties all of it together.
//!
//! # Attributes
//!
//! * A 16-bit *Attribute Handle* ([`Handle`]) uniquely identifying the attribute.
//! * A UUID ([`AttUuid`]) identifying the attribute type (16-bit UUIDs are kept in their short
//!   form when registered and only compared in their 128-bit expansion, via the Bluetooth Base
//!   UUID, on demand).
//! * The attribute's *value*, accessed indirectly through an access callback rather than stored
//!   inline (values can be dynamically computed, eg. a live sensor reading).
//! * A set of [`Permissions`] restricting which operations a peer may perform.

#[macro_use]
mod handle;
mod gateway;
mod mtu;
mod notify;
mod pdus;
mod prepare;
mod server;
mod table;
mod transport;
mod uuid;

use crate::utils::HexSlice;
use std::fmt;

pub use self::gateway::{AccessContext, AccessResult, Operation};
pub use self::handle::{Handle, HandleRange, RawHandleRange};
pub use self::mtu::MtuState;
pub use self::notify::NotificationSink;
pub use self::pdus::{AttError, ErrorCode, Opcode};
pub use self::prepare::PrepareQueue;
pub use self::server::{AttributeServer, ConnectionState};
pub use self::table::AttributeTable;
pub use self::transport::TransmitPort;
pub use self::uuid::AttUuid;

/// Maximum length in bytes of a single attribute's value (Bluetooth Core Spec v4.2, Vol. 3, Part
/// F, Section 3.2.9).
pub const MAX_ATTRIBUTE_VALUE_LEN: usize = 512;

bitflags::bitflags! {
    /// Per-attribute access permissions.
    ///
    /// `READ` and `WRITE` gate whether a peer may perform the corresponding operation at all;
    /// the remaining flags describe link-layer preconditions the caller (GATT / the security
    /// manager) is expected to have already satisfied before a read or write reaches this
    /// server. This core does not itself track encryption/authentication state of a connection
    /// (out of scope, §1) — it only consults these bits.
    pub struct Permissions: u8 {
        /// The attribute may be read by a connected peer.
        const READ = 0b0000_0001;
        /// The attribute may be written by a connected peer.
        const WRITE = 0b0000_0010;
        /// Access requires an encrypted link.
        const ENCRYPTION_REQUIRED = 0b0000_0100;
        /// Access requires an authenticated (MITM-protected) link.
        const AUTHENTICATION_REQUIRED = 0b0000_1000;
        /// Access requires the peer to be authorized at the application layer.
        const AUTHORIZATION_REQUIRED = 0b0001_0000;

        /// Shorthand for an attribute that a peer can both read and write.
        const READ_WRITE = Self::READ.bits | Self::WRITE.bits;
    }
}

/// A callback invoked by the [`gateway`] module to read or write an attribute's value.
///
/// `arg` is the opaque value passed to [`AttributeTable::register`] at registration time,
/// letting one function back many attributes (eg. all characteristics of one service) without
/// a closure per handle.
pub type AccessCallback = for<'a> fn(ctx: &mut AccessContext<'a>, arg: usize) -> AccessResult;

/// A single registered attribute.
///
/// Attributes are immutable once registered (§1 Non-goals: "any runtime attribute-table
/// mutation beyond append-only registration"); only the bytes the access callback reads/writes
/// through change over time.
#[derive(Clone, Copy)]
pub struct Attribute {
    /// The attribute's type, eg. "Primary Service" or a characteristic's declared UUID.
    pub att_type: AttUuid,
    /// The handle uniquely identifying this attribute within the server.
    pub handle: Handle,
    /// Access permissions enforced by the gateway.
    pub permissions: Permissions,
    /// The callback invoked to read or write this attribute's value.
    pub access_cb: AccessCallback,
    /// Opaque argument forwarded to `access_cb` on every invocation.
    pub cb_arg: usize,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("att_type", &self.att_type)
            .field("handle", &self.handle)
            .field("permissions", &self.permissions)
            .field("cb_arg", &HexSlice(self.cb_arg.to_le_bytes()))
            .finish()
    }
}
