//! Attribute Table and Handle Allocator (spec.md §4.1).

use super::{pdus::ErrorCode, AttError, AttUuid, Attribute, Handle, HandleRange};
use crate::uuid::Uuid16;

/// Primary Service declaration UUID (0x2800).
pub const PRIMARY_SERVICE: Uuid16 = Uuid16(0x2800);
/// Secondary Service declaration UUID (0x2801).
pub const SECONDARY_SERVICE: Uuid16 = Uuid16(0x2801);

/// Returns whether `uuid` names a valid grouping attribute usable in *Read By Group Type*
/// requests. Only Primary and Secondary Service are (spec.md §4.2).
pub fn is_grouping_type(uuid: AttUuid) -> bool {
    uuid == PRIMARY_SERVICE || uuid == SECONDARY_SERVICE
}

/// An append-only, insertion-ordered table of [`Attribute`]s, indexed by [`Handle`].
///
/// `N` is the table's fixed capacity (a const generic, the idiomatic replacement for NimBLE's
/// compile-time `MYNEWT_VAL(BLE_ATT_SVR_MAX_ATTRS)`). Handles are assigned monotonically
/// starting at [`Handle::FIRST`]; attempting to register past the handle space (`0xFFFE`) is a
/// fatal error (spec.md §3: "fails fatally if the handle space would wrap").
pub struct AttributeTable<const N: usize> {
    attrs: heapless::Vec<Attribute, N>,
    next_handle: Option<Handle>,
}

impl<const N: usize> AttributeTable<N> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            attrs: heapless::Vec::new(),
            next_handle: Some(Handle::FIRST),
        }
    }

    /// Registers a new attribute with a 128-bit type UUID, returning its freshly allocated
    /// handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle space is exhausted (spec.md §7: "invariant violation ... → fatal
    /// (process abort)"). This can only happen after roughly 65,000 registrations, all of which
    /// happen at startup in any realistic deployment.
    pub fn register(
        &mut self,
        att_type: AttUuid,
        permissions: super::Permissions,
        access_cb: super::AccessCallback,
        cb_arg: usize,
    ) -> Result<Handle, AttError> {
        let handle = match self.next_handle {
            Some(handle) => handle,
            None => {
                error!("attribute handle space exhausted");
                panic!("attribute handle allocator exhausted");
            }
        };

        let attr = Attribute {
            att_type,
            handle,
            permissions,
            access_cb,
            cb_arg,
        };

        self.attrs
            .push(attr)
            .map_err(|_| AttError::new(ErrorCode::InsufficientResources, Handle::NULL))?;

        self.next_handle = handle.next();
        debug!("registered attribute {:?} at {:?}", att_type, handle);
        Ok(handle)
    }

    /// Like [`register`](Self::register), but takes a 16-bit UUID alias, expanded to its
    /// 128-bit form via the Bluetooth Base UUID before being stored (spec.md §4.1).
    pub fn register_by_uuid16(
        &mut self,
        att_type: Uuid16,
        permissions: super::Permissions,
        access_cb: super::AccessCallback,
        cb_arg: usize,
    ) -> Result<Handle, AttError> {
        self.register(AttUuid::from(att_type), permissions, access_cb, cb_arg)
    }

    /// Finds the attribute with the given handle.
    pub fn find_by_handle(&self, handle: Handle) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.handle == handle)
    }

    /// Cursor-style scan for the next attribute (after `after`, exclusive) whose type equals
    /// `uuid`.
    ///
    /// Passing `None` starts the scan from the beginning of the table.
    pub fn find_by_uuid(&self, after: Option<Handle>, uuid: AttUuid) -> Option<&Attribute> {
        let start = match after {
            Some(h) => self
                .attrs
                .iter()
                .position(|a| a.handle == h)
                .map_or(self.attrs.len(), |i| i + 1),
            None => 0,
        };
        self.attrs[start..].iter().find(|a| a.att_type == uuid)
    }

    /// Iterates every attribute whose handle falls within `range`, in ascending handle order.
    pub fn attrs_in_range(&self, range: &HandleRange) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter().filter(move |a| range.contains(a.handle))
    }

    /// For a grouping attribute at `start` (must satisfy [`is_grouping_type`]), returns the
    /// handle of the last attribute belonging to its group: every attribute up to, but
    /// excluding, the next grouping attribute, or [`Handle::RESERVED`] (`0xFFFF`) if `start`'s
    /// group runs to the end of the table (spec.md §4.2 "Read By Group Type Request").
    pub fn group_end(&self, start: Handle) -> Handle {
        let mut iter = self.attrs.iter().skip_while(|a| a.handle != start);
        iter.next(); // skip the grouping attribute itself

        let mut last = start;
        for attr in iter {
            if is_grouping_type(attr.att_type) {
                return last;
            }
            last = attr.handle;
        }
        // Ran off the end of the table without finding another grouping attribute: per
        // spec.md §4.2, the group's end handle is emitted as 0xFFFF in this case.
        Handle::RESERVED
    }

    /// Number of registered attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

impl<const N: usize> Default for AttributeTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::{AccessContext, AccessResult, Operation, Permissions};
    use crate::uuid::Uuid16;

    fn cb(ctx: &mut AccessContext<'_>, _arg: usize) -> AccessResult {
        match ctx.operation {
            Operation::Read => AccessResult::Ok { data: b"" },
            Operation::Write => AccessResult::Ok { data: &[] },
        }
    }

    #[test]
    fn handles_are_monotone() {
        let mut table: AttributeTable<8> = AttributeTable::new();
        let h1 = table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();
        let h2 = table
            .register_by_uuid16(Uuid16(0x2803), Permissions::READ, cb, 0)
            .unwrap();
        assert_eq!(h1.as_u16() + 1, h2.as_u16());
    }

    #[test]
    fn find_by_uuid_cursor_advances() {
        let mut table: AttributeTable<8> = AttributeTable::new();
        let h1 = table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();
        let h2 = table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();

        let first = table.find_by_uuid(None, AttUuid::from(Uuid16(0x2800))).unwrap();
        assert_eq!(first.handle, h1);
        let second = table
            .find_by_uuid(Some(first.handle), AttUuid::from(Uuid16(0x2800)))
            .unwrap();
        assert_eq!(second.handle, h2);
        assert!(table
            .find_by_uuid(Some(second.handle), AttUuid::from(Uuid16(0x2800)))
            .is_none());
    }

    #[test]
    fn group_end_stops_before_next_group() {
        let mut table: AttributeTable<8> = AttributeTable::new();
        let svc1 = table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();
        table
            .register_by_uuid16(Uuid16(0x2803), Permissions::READ, cb, 0)
            .unwrap();
        let last = table
            .register_by_uuid16(Uuid16(0x2803), Permissions::READ, cb, 0)
            .unwrap();
        table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();

        assert_eq!(table.group_end(svc1), last);
    }

    #[test]
    fn group_end_is_reserved_at_table_end() {
        let mut table: AttributeTable<8> = AttributeTable::new();
        let svc = table
            .register_by_uuid16(Uuid16(0x2800), Permissions::READ, cb, 0)
            .unwrap();
        assert_eq!(table.group_end(svc), Handle::RESERVED);
    }
}
