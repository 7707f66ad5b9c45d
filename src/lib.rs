//! A hosted implementation of the Bluetooth Attribute Protocol (ATT) server.
//!
//! This crate owns the attribute table, the handle allocator, the permission-checked access
//! gateway, the prepare/execute-write two-phase commit engine, MTU negotiation, and the request
//! dispatcher that together make up an ATT server (Bluetooth Core Spec v4.2, Vol. 3, Part F).
//! GATT profile semantics, L2CAP channel management, and link-layer/security-manager concerns sit
//! above and below this crate and are out of scope.
//!
//! # Using this crate
//!
//! Construct an [`att::AttributeServer`], register attributes into its [`att::AttributeTable`]
//! at startup, then feed it inbound PDU bytes through [`att::AttributeServer::process_request`]
//! for each connection's [`att::ConnectionState`]. Responses are written out through a
//! caller-provided [`att::TransmitPort`].

#[macro_use]
mod log;
#[macro_use]
mod utils;
pub mod att;
pub mod bytes;
mod error;
pub mod uuid;

pub use self::error::Error;
