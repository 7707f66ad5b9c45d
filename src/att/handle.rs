//! Attribute handles.

use crate::{
    att::{AttError, ErrorCode},
    bytes::*,
    Error,
};
use std::{fmt, ops::RangeInclusive};

/// A 16-bit handle uniquely identifying an attribute on an ATT server.
///
/// `0x0000` (`NULL`) is invalid and must never be assigned to a registered attribute.
/// `0xFFFF` is reserved so the handle allocator can detect overflow before it would ever
/// hand out a colliding value.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u16);

impl Handle {
    /// The `0x0000` handle is not used for actual attributes, but as a special placeholder when no
    /// attribute handle is valid (eg. in error responses).
    pub const NULL: Self = Handle(0x0000);

    /// The `0xFFFF` handle is reserved and can never be assigned to an attribute.
    ///
    /// It also stands for "end of table" when emitting the last group of a *Read By Group Type*
    /// response, matching the Bluetooth spec's convention.
    pub const RESERVED: Self = Handle(0xFFFF);

    /// The first handle value ever assigned by the allocator.
    pub const FIRST: Self = Handle(0x0001);

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Create an attribute handle from a raw u16.
    pub fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }

    /// Returns the next handle in sequence, or `None` if that would collide with
    /// `Handle::RESERVED`.
    pub fn next(self) -> Option<Self> {
        if self.0 >= Self::RESERVED.0 - 1 {
            None
        } else {
            Some(Handle(self.0 + 1))
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl FromBytes<'_> for Handle {
    fn from_bytes(bytes: &mut ByteReader) -> Result<Self, Error> {
        Ok(Handle(bytes.read_u16_le()?))
    }
}

impl ToBytes for Handle {
    fn to_bytes(&self, writer: &mut ByteWriter) -> Result<(), Error> {
        writer.write_u16_le(self.0)
    }
}

/// A (de)serializable handle range that isn't checked for validity.
#[derive(Debug, Copy, Clone)]
pub struct RawHandleRange {
    pub start: Handle,
    pub end: Handle,
}

impl RawHandleRange {
    /// Checks that this handle range is valid according to the Bluetooth spec: both ends
    /// nonzero and `start <= end`.
    ///
    /// Returns an `AttError` ("invalid handle", blaming `start`) that should be sent as a
    /// response if the range is invalid.
    pub fn check(&self) -> Result<HandleRange, AttError> {
        if self.start.0 > self.end.0 || self.start.0 == 0 {
            Err(AttError::new(ErrorCode::InvalidHandle, self.start))
        } else {
            Ok(HandleRange(self.start..=self.end))
        }
    }
}

impl FromBytes<'_> for RawHandleRange {
    fn from_bytes(bytes: &mut ByteReader) -> Result<Self, Error> {
        Ok(Self {
            start: Handle::from_bytes(bytes)?,
            end: Handle::from_bytes(bytes)?,
        })
    }
}

impl ToBytes for RawHandleRange {
    fn to_bytes(&self, writer: &mut ByteWriter) -> Result<(), Error> {
        writer.write_u16_le(self.start.as_u16())?;
        writer.write_u16_le(self.end.as_u16())?;
        Ok(())
    }
}

/// A (de)serializable handle range that has been checked for validity.
#[derive(Debug, Clone)]
pub struct HandleRange(RangeInclusive<Handle>);

impl HandleRange {
    /// A range covering exactly one handle (used internally, eg. by `Read Request`, which
    /// targets a single handle but reuses the range-scanning table walk).
    pub fn single(handle: Handle) -> Self {
        HandleRange(handle..=handle)
    }

    /// Checks if a `Handle` is in this range.
    pub fn contains(&self, handle: Handle) -> bool {
        *self.0.start() <= handle && handle <= *self.0.end()
    }

    pub fn start(&self) -> Handle {
        *self.0.start()
    }

    pub fn end(&self) -> Handle {
        *self.0.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_start() {
        let raw = RawHandleRange {
            start: Handle::NULL,
            end: Handle::from_raw(5),
        };
        assert!(raw.check().is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let raw = RawHandleRange {
            start: Handle::from_raw(5),
            end: Handle::from_raw(1),
        };
        assert!(raw.check().is_err());
    }

    #[test]
    fn accepts_single_handle_range() {
        let raw = RawHandleRange {
            start: Handle::from_raw(5),
            end: Handle::from_raw(5),
        };
        let range = raw.check().unwrap();
        assert!(range.contains(Handle::from_raw(5)));
        assert!(!range.contains(Handle::from_raw(4)));
    }
}
