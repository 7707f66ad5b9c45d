use crate::{bytes::*, uuid::*, Error};
use std::{cmp::PartialEq, fmt};

/// ATT protocol UUID (either a 16 or a 128-bit UUID).
///
/// 32-bit UUIDs are not supported by ATT and must be converted to 128-bit UUIDs.
#[derive(Copy, Clone, Eq)]
pub enum AttUuid {
    Uuid16(Uuid16),
    Uuid128(Uuid128),
}

impl AttUuid {
    /// If `self` is a 16-bit UUID, or a 128-bit UUID carrying a 16-bit short form, returns that
    /// 16-bit value.
    ///
    /// Used by *Find Information Response* to decide the single format byte the response commits
    /// to: the first included attribute picks 16-bit or 128-bit, and any attribute whose own
    /// `as_uuid16` disagrees with that choice ends the response (spec.md §4.2).
    pub fn as_uuid16(&self) -> Option<Uuid16> {
        match self {
            AttUuid::Uuid16(u) => Some(*u),
            AttUuid::Uuid128(u) => u.as_uuid16(),
        }
    }
}

impl FromBytes<'_> for AttUuid {
    fn from_bytes(bytes: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(match bytes.bytes_left() {
            2 => AttUuid::Uuid16(Uuid16::from_bytes(bytes)?),
            16 => AttUuid::Uuid128(Uuid128::from_bytes(bytes)?),
            _ => return Err(Error::InvalidLength),
        })
    }
}

impl ToBytes for AttUuid {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        match self {
            AttUuid::Uuid16(uuid) => uuid.to_bytes(writer),
            AttUuid::Uuid128(uuid) => uuid.to_bytes(writer),
        }
    }
}

impl PartialEq for AttUuid {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // 16-bit UUIDs can be compared directly
            (AttUuid::Uuid16(a), AttUuid::Uuid16(b)) => a == b,

            // All other combinations need to convert to 128-bit UUIDs
            (AttUuid::Uuid128(a), b) | (b, AttUuid::Uuid128(a)) => {
                let b: Uuid128 = (*b).into();
                *a == b
            }
        }
    }
}

impl PartialEq<Uuid16> for AttUuid {
    fn eq(&self, other: &Uuid16) -> bool {
        self == &Self::from(*other)
    }
}

impl PartialEq<Uuid128> for AttUuid {
    fn eq(&self, other: &Uuid128) -> bool {
        self == &Self::from(*other)
    }
}

impl From<Uuid16> for AttUuid {
    fn from(uu: Uuid16) -> Self {
        AttUuid::Uuid16(uu)
    }
}

impl From<Uuid32> for AttUuid {
    fn from(uu: Uuid32) -> Self {
        AttUuid::Uuid128(uu.into())
    }
}

impl From<Uuid128> for AttUuid {
    fn from(uu: Uuid128) -> Self {
        AttUuid::Uuid128(uu)
    }
}

impl From<AttUuid> for Uuid128 {
    fn from(uu: AttUuid) -> Self {
        match uu {
            AttUuid::Uuid16(u) => u.into(),
            AttUuid::Uuid128(u) => u,
        }
    }
}

impl fmt::Debug for AttUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttUuid::Uuid16(u) => u.fmt(f),
            AttUuid::Uuid128(u) => u.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_16_and_128_bit_forms_equal() {
        let short = AttUuid::from(Uuid16(0x2800));
        let long = AttUuid::from(Uuid128::from(Uuid16(0x2800)));
        assert_eq!(short, long);
    }

    #[test]
    fn recovers_16_bit_alias() {
        let uuid = AttUuid::from(Uuid16(0x2800));
        assert_eq!(uuid.as_uuid16(), Some(Uuid16(0x2800)));
    }

    #[test]
    fn genuine_128_bit_uuid_has_no_alias() {
        let uuid = AttUuid::from(Uuid128::parse_static(
            "12345678-1234-5678-1234-56789abcdef0",
        ));
        assert_eq!(uuid.as_uuid16(), None);
    }
}
