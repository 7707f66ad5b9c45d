//! Request Dispatcher (spec.md §4.2) and the `AttributeServer`/`ConnectionState` types that hold
//! the attribute table, the per-connection MTU and prepare queue, and the notification sink.

use super::{
    gateway,
    notify::{self, ConnectionHandle, NotificationSink},
    pdus::{AttPdu, ByGroupAttData, ByTypeAttData, ErrorCode, Opcode},
    table::is_grouping_type,
    transport::{self, TransmitPort},
    AttError, AttUuid, Attribute, AttributeTable, Handle, MtuState, Operation, PrepareQueue,
    MAX_ATTRIBUTE_VALUE_LEN,
};
use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::utils::HexSlice;
use crate::uuid::Uuid128;
use crate::Error;
use std::sync::Mutex;

/// Largest body this dispatcher will ever assemble before MTU clamping. Bounded by the maximum
/// attribute value length plus per-record framing overhead; generous enough that no realistic
/// MTU negotiation exceeds it.
const MAX_BODY_LEN: usize = 1024;

/// Largest complete wire PDU (opcode + fixed header fields + body) this dispatcher will encode.
/// A few bytes larger than `MAX_BODY_LEN` to leave room for the opcode/format/length header
/// bytes every PDU carries in front of its body.
const MAX_WIRE_LEN: usize = MAX_BODY_LEN + 8;

/// Per-connection ATT state: the negotiated MTU and the outstanding prepare-write queue.
///
/// `PREPARE_CAP` bounds how many prepared-write fragments this connection may have queued at
/// once (spec.md §3 "Per-Connection Server State").
pub struct ConnectionState<const PREPARE_CAP: usize> {
    mtu: MtuState,
    prepare: PrepareQueue<PREPARE_CAP>,
}

impl<const PREPARE_CAP: usize> ConnectionState<PREPARE_CAP> {
    /// Creates state for a freshly established connection, advertising `local_mtu` as this
    /// server's preferred MTU.
    pub fn new(local_mtu: u16) -> Self {
        Self {
            mtu: MtuState::new(local_mtu),
            prepare: PrepareQueue::new(),
        }
    }

    /// Clears all per-connection state. Call on disconnect (spec.md §4.3 "Clearing").
    pub fn on_disconnect(&mut self) {
        self.prepare.clear();
    }
}

impl<const PREPARE_CAP: usize> Default for ConnectionState<PREPARE_CAP> {
    fn default() -> Self {
        Self::new(super::mtu::DEFAULT_MTU)
    }
}

/// The ATT server: owns the attribute table and the process-wide notification sink.
///
/// `TABLE_CAP` bounds the number of registered attributes (spec.md §3 "Attribute Table").
/// Per spec.md §5, the table, and the notification sink are guarded by one coarse host lock;
/// access callbacks are always invoked with that lock released.
pub struct AttributeServer<const TABLE_CAP: usize> {
    table: Mutex<AttributeTable<TABLE_CAP>>,
    notify_sink: Mutex<Option<NotificationSink>>,
}

impl<const TABLE_CAP: usize> AttributeServer<TABLE_CAP> {
    /// Creates a server with an empty attribute table and no notification sink.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(AttributeTable::new()),
            notify_sink: Mutex::new(None),
        }
    }

    /// Provides locked access to the underlying attribute table, eg. for registration at
    /// startup.
    pub fn table(&self) -> std::sync::MutexGuard<'_, AttributeTable<TABLE_CAP>> {
        self.table.lock().unwrap()
    }

    /// Registers (or replaces) the process-wide notification sink (spec.md §3).
    pub fn set_notification_sink(&self, sink: Option<NotificationSink>) {
        *self.notify_sink.lock().unwrap() = sink;
    }

    fn snapshot_attr(&self, handle: Handle) -> Option<Attribute> {
        self.table.lock().unwrap().find_by_handle(handle).copied()
    }

    fn snapshot_range(&self, range: &super::HandleRange) -> Vec<Attribute> {
        self.table
            .lock()
            .unwrap()
            .attrs_in_range(range)
            .copied()
            .collect()
    }

    fn group_end(&self, handle: Handle) -> Handle {
        self.table.lock().unwrap().group_end(handle)
    }

    /// Processes one inbound ATT PDU and, through `port`, emits exactly the PDU(s) the wire
    /// contract prescribes (spec.md §4.2, §4.5): an affirmative response, an Error Response, or
    /// nothing.
    pub fn process_request<const PREPARE_CAP: usize>(
        &self,
        conn: ConnectionHandle,
        state: &mut ConnectionState<PREPARE_CAP>,
        request: &[u8],
        port: &mut dyn TransmitPort,
    ) {
        let mut reader = ByteReader::new(request);
        let pdu = match AttPdu::from_bytes(&mut reader) {
            Ok(pdu) => pdu,
            Err(_) => {
                // Malformed PDU: we can't even recover an opcode to blame. Drop it, mirroring
                // "protocol violation ... invalid PDU" with no well-formed opcode to echo back.
                return;
            }
        };
        let opcode = pdu.opcode();
        debug!("ATT<- {:?}", pdu);

        // `body_buf` is where handlers stage the variable-length body of their response (the
        // part of the PDU that is built incrementally, eg. the attribute data list); `wire_buf`
        // is a distinct buffer the final framed PDU (opcode + fixed header + that body) is
        // encoded into. Kept separate so a response holding a borrow into `body_buf` can still
        // be read by `transport::send_result` while it writes the fully framed PDU elsewhere —
        // reusing one buffer for both would alias the same bytes as both read and write source.
        let mut body_buf = [0u8; MAX_BODY_LEN];
        let result = self.dispatch(conn, state, &pdu, &mut body_buf);

        let mut wire_buf = [0u8; MAX_WIRE_LEN];
        match result {
            Dispatch::Reply(rsp) => {
                debug!("ATT-> {:?}", rsp);
                transport::send_result(port, &mut wire_buf, opcode, Ok(rsp));
            }
            Dispatch::Error(err) => {
                debug!("ATT-> {:?}", err);
                transport::send_result(port, &mut wire_buf, opcode, Err(err));
            }
            Dispatch::None => {}
        }
    }

    fn dispatch<'b, const PREPARE_CAP: usize>(
        &self,
        conn: ConnectionHandle,
        state: &mut ConnectionState<PREPARE_CAP>,
        pdu: &AttPdu<'b>,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let mtu = state.mtu.current() as usize;

        match *pdu {
            AttPdu::ExchangeMtuReq { mtu: peer_mtu } => {
                let local = state.mtu.exchange(peer_mtu);
                Dispatch::Reply(AttPdu::ExchangeMtuRsp { mtu: local })
            }

            AttPdu::FindInformationReq { handle_range } => {
                match handle_range.check() {
                    Ok(range) => self.find_information(&range, mtu, out_buf),
                    Err(e) => Dispatch::Error(e),
                }
            }

            AttPdu::FindByTypeValueReq {
                handle_range,
                attribute_type,
                attribute_value,
            } => match handle_range.check() {
                Ok(range) => self.find_by_type_value(
                    &range,
                    attribute_type,
                    attribute_value.as_ref(),
                    mtu,
                    out_buf,
                ),
                Err(e) => Dispatch::Error(e),
            },

            AttPdu::ReadByTypeReq {
                handle_range,
                attribute_type,
            } => match handle_range.check() {
                Ok(range) => self.read_by_type(&range, attribute_type, mtu, out_buf),
                Err(e) => Dispatch::Error(e),
            },

            AttPdu::ReadReq { handle } => self.read(handle, mtu, out_buf),

            AttPdu::ReadBlobReq { handle, offset } => self.read_blob(handle, offset, mtu, out_buf),

            AttPdu::ReadMultipleReq { handles } => self.read_multiple(handles.as_ref(), mtu, out_buf),

            AttPdu::ReadByGroupReq {
                handle_range,
                group_type,
            } => match handle_range.check() {
                Ok(range) => self.read_by_group_type(&range, group_type, mtu, out_buf),
                Err(e) => Dispatch::Error(e),
            },

            AttPdu::WriteReq { handle, value } => match self.write(handle, value.as_ref()) {
                Ok(()) => Dispatch::Reply(AttPdu::WriteRsp),
                Err(e) => Dispatch::Error(e),
            },

            AttPdu::WriteCommand { handle, value } => {
                let _ = self.write(handle, value.as_ref());
                Dispatch::None
            }

            AttPdu::SignedWriteCommand { handle, value, .. } => {
                // Signature verification is a security-manager concern (out of scope, §1); the
                // signature is parsed (so the PDU isn't misframed) and discarded.
                let _ = self.write(handle, value.as_ref());
                Dispatch::None
            }

            AttPdu::PrepareWriteReq {
                handle,
                offset,
                value,
            } => {
                if self.snapshot_attr(handle).is_none() {
                    return Dispatch::Error(AttError::new(ErrorCode::InvalidHandle, handle));
                }
                match state.prepare.enqueue(handle, offset, value.as_ref()) {
                    Ok(()) => {
                        debug!("ATT prepare-write queued: {:?} ({} entries)", handle, state.prepare.len());
                        Dispatch::Reply(AttPdu::PrepareWriteRsp {
                            handle,
                            offset,
                            value,
                        })
                    }
                    Err(e) => Dispatch::Error(e),
                }
            }

            AttPdu::ExecuteWriteReq { flags } => self.execute_write(state, flags),

            AttPdu::HandleValueNotification { handle, value } => {
                self.inbound_notify(conn, handle, value.as_ref(), false);
                Dispatch::None
            }

            AttPdu::HandleValueIndication { handle, value } => {
                if self.inbound_notify(conn, handle, value.as_ref(), true) {
                    Dispatch::Reply(AttPdu::HandleValueConfirmation)
                } else {
                    Dispatch::None
                }
            }

            // A spurious confirmation with no indication in flight is simply dropped (this core
            // is the one emitting indications to its own peers elsewhere, not correlating against
            // one here).
            AttPdu::HandleValueConfirmation => Dispatch::None,

            // Responses received as a freshly inbound message are always a protocol violation.
            AttPdu::ErrorRsp { .. }
            | AttPdu::ExchangeMtuRsp { .. }
            | AttPdu::FindInformationRsp { .. }
            | AttPdu::FindByTypeValueRsp { .. }
            | AttPdu::ReadByTypeRsp { .. }
            | AttPdu::ReadRsp { .. }
            | AttPdu::ReadBlobRsp { .. }
            | AttPdu::ReadMultipleRsp { .. }
            | AttPdu::ReadByGroupRsp { .. }
            | AttPdu::WriteRsp
            | AttPdu::PrepareWriteRsp { .. }
            | AttPdu::ExecuteWriteRsp => Dispatch::Error(AttError::new(ErrorCode::InvalidPdu, Handle::NULL)),

            // Anything this dispatch doesn't explicitly implement: silently ignored if it's a
            // Command, otherwise `RequestNotSupported` (SPEC_FULL.md §B).
            AttPdu::Unknown { opcode, .. } => {
                if opcode.is_command() {
                    Dispatch::None
                } else {
                    Dispatch::Error(AttError::new(ErrorCode::RequestNotSupported, Handle::NULL))
                }
            }
        }
    }

    fn find_information<'b>(
        &self,
        range: &super::HandleRange,
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let snapshot = self.snapshot_range(range);
        let cap = mtu.saturating_sub(2).min(MAX_BODY_LEN);
        let mut writer = ByteWriter::new(&mut out_buf[..cap]);

        let mut format: Option<u8> = None;
        let mut count = 0usize;

        for attr in &snapshot {
            let (entry_format, entry_len) = match attr.att_type.as_uuid16() {
                Some(_) => (1u8, 2 + 2),
                None => (2u8, 2 + 16),
            };
            match format {
                None => format = Some(entry_format),
                Some(f) if f != entry_format => break,
                _ => {}
            }
            if writer.space_left() < entry_len {
                break;
            }
            writer.write_u16_le(attr.handle.as_u16()).unwrap();
            match attr.att_type.as_uuid16() {
                Some(u) => u.to_bytes(&mut writer).unwrap(),
                None => Uuid128::from(attr.att_type).to_bytes(&mut writer).unwrap(),
            }
            count += 1;
        }

        if count == 0 {
            return Dispatch::Error(AttError::attribute_not_found());
        }

        let used = cap - writer.space_left();
        Dispatch::Reply(AttPdu::FindInformationRsp {
            format: format.unwrap(),
            data: HexSlice(&out_buf[..used]),
        })
    }

    fn find_by_type_value<'b>(
        &self,
        range: &super::HandleRange,
        attribute_type: u16,
        value: &[u8],
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let snapshot = self.snapshot_range(range);
        let wanted = AttUuid::from(crate::uuid::Uuid16(attribute_type));

        let mut groups: Vec<(Handle, Handle)> = Vec::new();
        for attr in &snapshot {
            if attr.att_type != wanted {
                continue;
            }
            let matched = match gateway::access(attr, Operation::Read, 0, &[], true) {
                Ok(data) => data == value,
                Err(_) => false,
            };
            if !matched {
                continue;
            }
            match groups.last_mut() {
                Some((_, last)) if last.next() == Some(attr.handle) => {
                    *last = attr.handle;
                }
                _ => groups.push((attr.handle, attr.handle)),
            }
        }

        if groups.is_empty() {
            return Dispatch::Error(AttError::attribute_not_found());
        }

        let cap = mtu.saturating_sub(1).min(MAX_BODY_LEN);
        let mut writer = ByteWriter::new(&mut out_buf[..cap]);
        let mut written = 0;
        for (first, last) in groups {
            if writer.space_left() < 4 {
                break;
            }
            writer.write_u16_le(first.as_u16()).unwrap();
            writer.write_u16_le(last.as_u16()).unwrap();
            written += 1;
        }
        let _ = written;

        let used = cap - writer.space_left();
        Dispatch::Reply(AttPdu::FindByTypeValueRsp {
            handles_information_list: HexSlice(&out_buf[..used]),
        })
    }

    fn read_by_type<'b>(
        &self,
        range: &super::HandleRange,
        attribute_type: AttUuid,
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let snapshot = self.snapshot_range(range);
        let cap = mtu.saturating_sub(2).min(MAX_BODY_LEN);
        let mut writer = ByteWriter::new(&mut out_buf[..cap]);

        let mut record_len: Option<usize> = None;
        let mut first_err: Option<AttError> = None;

        for attr in &snapshot {
            if attr.att_type != attribute_type {
                continue;
            }
            let value = match gateway::access(attr, Operation::Read, 0, &[], true) {
                Ok(v) => v,
                Err(e) => {
                    if record_len.is_none() {
                        first_err.get_or_insert(e);
                    }
                    break;
                }
            };
            // `length` is a single wire byte, so each record (2-byte handle + value) must stay
            // at or under 255 bytes regardless of how large the negotiated MTU is.
            let data = ByTypeAttData::new(mtu.saturating_sub(2).min(255), attr.handle, value);
            match record_len {
                None => record_len = Some(data.encoded_size()),
                Some(len) if len != data.encoded_size() => break,
                _ => {}
            }
            if writer.space_left() < data.encoded_size() {
                break;
            }
            data.to_bytes(&mut writer).unwrap();
        }

        match record_len {
            None => Dispatch::Error(first_err.unwrap_or_else(AttError::attribute_not_found)),
            Some(len) => {
                let used = cap - writer.space_left();
                Dispatch::Reply(AttPdu::ReadByTypeRsp {
                    length: len as u8,
                    data_list: HexSlice(&out_buf[..used]),
                })
            }
        }
    }

    fn read<'b>(&self, handle: Handle, mtu: usize, out_buf: &'b mut [u8; MAX_BODY_LEN]) -> Dispatch<'b> {
        let attr = match self.snapshot_attr(handle) {
            Some(a) => a,
            None => return Dispatch::Error(AttError::new(ErrorCode::InvalidHandle, handle)),
        };
        match gateway::access(&attr, Operation::Read, 0, &[], true) {
            Ok(value) => {
                let cap = mtu.saturating_sub(1).min(value.len()).min(MAX_BODY_LEN);
                out_buf[..cap].copy_from_slice(&value[..cap]);
                Dispatch::Reply(AttPdu::ReadRsp {
                    value: HexSlice(&out_buf[..cap]),
                })
            }
            Err(e) => Dispatch::Error(e),
        }
    }

    fn read_blob<'b>(
        &self,
        handle: Handle,
        offset: u16,
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let attr = match self.snapshot_attr(handle) {
            Some(a) => a,
            None => return Dispatch::Error(AttError::new(ErrorCode::InvalidHandle, handle)),
        };
        let value = match gateway::access(&attr, Operation::Read, offset, &[], true) {
            Ok(v) => v,
            Err(e) => return Dispatch::Error(e),
        };

        let offset = offset as usize;
        if offset > value.len() {
            return Dispatch::Error(AttError::new(ErrorCode::InvalidOffset, handle));
        }
        let tail = &value[offset..];

        // §9 Open Question: this rejects even a legitimately final short tail when
        // offset + tail.len() <= mtu - 3. Kept as-specified for wire compatibility.
        if offset + tail.len() <= mtu.saturating_sub(3) {
            return Dispatch::Error(AttError::new(ErrorCode::AttributeNotLong, handle));
        }

        let cap = mtu.saturating_sub(1).min(tail.len()).min(MAX_BODY_LEN);
        out_buf[..cap].copy_from_slice(&tail[..cap]);
        Dispatch::Reply(AttPdu::ReadBlobRsp {
            value: HexSlice(&out_buf[..cap]),
        })
    }

    fn read_multiple<'b>(
        &self,
        handles: &[u8],
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        let cap = mtu.saturating_sub(1).min(MAX_BODY_LEN);
        let mut writer = ByteWriter::new(&mut out_buf[..cap]);

        for chunk in handles.chunks(2) {
            if chunk.len() != 2 {
                break;
            }
            let handle = Handle::from_raw(u16::from_le_bytes([chunk[0], chunk[1]]));
            let attr = match self.snapshot_attr(handle) {
                Some(a) => a,
                None => return Dispatch::Error(AttError::new(ErrorCode::InvalidHandle, handle)),
            };
            let value = match gateway::access(&attr, Operation::Read, 0, &[], true) {
                Ok(v) => v,
                Err(e) => return Dispatch::Error(e),
            };
            if writer.write_slice(value).is_err() {
                break;
            }
        }

        let used = cap - writer.space_left();
        Dispatch::Reply(AttPdu::ReadMultipleRsp {
            values: HexSlice(&out_buf[..used]),
        })
    }

    fn read_by_group_type<'b>(
        &self,
        range: &super::HandleRange,
        group_type: AttUuid,
        mtu: usize,
        out_buf: &'b mut [u8; MAX_BODY_LEN],
    ) -> Dispatch<'b> {
        if !is_grouping_type(group_type) {
            return Dispatch::Error(AttError::new(ErrorCode::UnsupportedGroupType, range.start()));
        }

        let snapshot = self.snapshot_range(range);
        let groups: Vec<(Attribute, Handle)> = snapshot
            .into_iter()
            .filter(|a| a.att_type == group_type)
            .map(|a| {
                let end = self.group_end(a.handle);
                (a, end)
            })
            .collect();

        let cap = mtu.saturating_sub(2).min(MAX_BODY_LEN);
        let mut writer = ByteWriter::new(&mut out_buf[..cap]);
        let mut record_len: Option<usize> = None;
        let mut first_err: Option<AttError> = None;

        for (attr, group_end) in &groups {
            let value = match gateway::access(attr, Operation::Read, 0, &[], true) {
                Ok(v) => v,
                Err(e) => {
                    if record_len.is_none() {
                        first_err.get_or_insert(e);
                    }
                    break;
                }
            };
            let data = ByGroupAttData::new(mtu.saturating_sub(2), attr.handle, *group_end, value);
            match record_len {
                None => record_len = Some(data.encoded_size()),
                Some(len) if len != data.encoded_size() => break,
                _ => {}
            }
            if writer.space_left() < data.encoded_size() {
                break;
            }
            data.to_bytes(&mut writer).unwrap();
        }

        match record_len {
            None => Dispatch::Error(first_err.unwrap_or_else(AttError::attribute_not_found)),
            Some(len) => {
                let used = cap - writer.space_left();
                Dispatch::Reply(AttPdu::ReadByGroupRsp {
                    length: len as u8,
                    data_list: HexSlice(&out_buf[..used]),
                })
            }
        }
    }

    fn write(&self, handle: Handle, value: &[u8]) -> Result<(), AttError> {
        let attr = self
            .snapshot_attr(handle)
            .ok_or_else(|| AttError::new(ErrorCode::InvalidHandle, handle))?;
        gateway::access(&attr, Operation::Write, 0, value, true)?;
        Ok(())
    }

    fn execute_write<'b, const PREPARE_CAP: usize>(
        &self,
        state: &mut ConnectionState<PREPARE_CAP>,
        flags: u8,
    ) -> Dispatch<'b> {
        if flags == 0 {
            state.prepare.clear();
            return Dispatch::Reply(AttPdu::ExecuteWriteRsp);
        }

        if let Err(e) = state.prepare.validate() {
            state.prepare.clear();
            return Dispatch::Error(e);
        }

        let entries = state.prepare.entries();
        let mut scratch = [0u8; MAX_ATTRIBUTE_VALUE_LEN];
        let mut i = 0;
        while i < entries.len() {
            let handle = entries[i].handle;
            let mut len = 0;
            while i < entries.len() && entries[i].handle == handle {
                let frag = &entries[i].data;
                scratch[len..len + frag.len()].copy_from_slice(frag);
                len += frag.len();
                i += 1;
            }

            if let Err(e) = self.write(handle, &scratch[..len]) {
                state.prepare.clear();
                return Dispatch::Error(e);
            }
        }

        state.prepare.clear();
        debug!("ATT execute-write committed");
        Dispatch::Reply(AttPdu::ExecuteWriteRsp)
    }

    fn inbound_notify(
        &self,
        conn: ConnectionHandle,
        handle: Handle,
        payload: &[u8],
        is_indication: bool,
    ) -> bool {
        if handle == Handle::NULL {
            return false;
        }
        let sink = self.notify_sink.lock().unwrap();
        notify::deliver(sink.as_ref(), conn, handle, payload, is_indication)
    }
}

impl<const TABLE_CAP: usize> Default for AttributeServer<TABLE_CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of dispatching one request, before being handed to [`transport`].
enum Dispatch<'a> {
    Reply(AttPdu<'a>),
    Error(AttError),
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::{AccessContext, AccessResult, Permissions};
    use crate::uuid::Uuid16;

    struct FakePort {
        sent: Vec<Vec<u8>>,
    }

    impl TransmitPort for FakePort {
        fn transmit(&mut self, pdu: &[u8]) -> Result<(), ()> {
            self.sent.push(pdu.to_vec());
            Ok(())
        }
    }

    fn echo_cb(ctx: &mut AccessContext<'_>, _arg: usize) -> AccessResult {
        match ctx.operation {
            Operation::Read => AccessResult::Ok { data: b"hello world this is a value" },
            Operation::Write => AccessResult::Ok { data: &[] },
        }
    }

    #[test]
    fn exchange_mtu_adopts_minimum() {
        let server: AttributeServer<8> = AttributeServer::new();
        let mut state: ConnectionState<4> = ConnectionState::new(100);
        let mut port = FakePort { sent: Vec::new() };

        server.process_request(1, &mut state, &[0x02, 0x64, 0x00], &mut port);

        assert_eq!(port.sent, vec![vec![0x03, 0x64, 0x00]]);
        assert_eq!(state.mtu.current(), 100);
    }

    #[test]
    fn read_unknown_handle_is_invalid_handle() {
        let server: AttributeServer<8> = AttributeServer::new();
        let mut state: ConnectionState<4> = ConnectionState::new(23);
        let mut port = FakePort { sent: Vec::new() };

        server.process_request(1, &mut state, &[0x0A, 0x01, 0x00], &mut port);

        assert_eq!(port.sent, vec![vec![0x01, 0x0A, 0x01, 0x00, 0x01]]);
    }

    #[test]
    fn read_truncates_to_mtu_minus_one() {
        let server: AttributeServer<8> = AttributeServer::new();
        {
            let mut table = server.table();
            table
                .register_by_uuid16(Uuid16(0x2A00), Permissions::READ, echo_cb, 0)
                .unwrap();
        }
        let mut state: ConnectionState<4> = ConnectionState::new(23);
        let mut port = FakePort { sent: Vec::new() };

        server.process_request(1, &mut state, &[0x0A, 0x01, 0x00], &mut port);

        let rsp = &port.sent[0];
        assert_eq!(rsp[0], 0x0B);
        assert_eq!(rsp.len(), 1 + 22);
    }

    #[test]
    fn prepare_then_execute_write_commits() {
        fn sink_cb(ctx: &mut AccessContext<'_>, _arg: usize) -> AccessResult {
            match ctx.operation {
                Operation::Write => AccessResult::Ok { data: &[] },
                Operation::Read => AccessResult::Ok { data: &[] },
            }
        }

        let server: AttributeServer<8> = AttributeServer::new();
        let handle = {
            let mut table = server.table();
            table
                .register_by_uuid16(Uuid16(0x2A00), Permissions::READ_WRITE, sink_cb, 0)
                .unwrap()
        };
        let mut state: ConnectionState<4> = ConnectionState::new(64);
        let mut port = FakePort { sent: Vec::new() };

        let h = handle.as_u16().to_le_bytes();
        let mut req = vec![0x16, h[0], h[1], 0x00, 0x00];
        req.extend_from_slice(b"abcde");
        server.process_request(1, &mut state, &req, &mut port);
        assert_eq!(port.sent.last().unwrap()[0], 0x17);

        server.process_request(1, &mut state, &[0x18, 0x01], &mut port);
        assert_eq!(port.sent.last().unwrap(), &vec![0x19]);
        assert!(state.prepare.is_empty());
    }

    #[test]
    fn execute_write_cancel_clears_queue() {
        let server: AttributeServer<8> = AttributeServer::new();
        let handle = {
            let mut table = server.table();
            table
                .register_by_uuid16(Uuid16(0x2A00), Permissions::READ_WRITE, echo_cb, 0)
                .unwrap()
        };
        let mut state: ConnectionState<4> = ConnectionState::new(64);
        let mut port = FakePort { sent: Vec::new() };

        let h = handle.as_u16().to_le_bytes();
        let mut req = vec![0x16, h[0], h[1], 0x00, 0x00];
        req.extend_from_slice(b"abcde");
        server.process_request(1, &mut state, &req, &mut port);

        server.process_request(1, &mut state, &[0x18, 0x00], &mut port);
        assert_eq!(port.sent.last().unwrap(), &vec![0x19]);
        assert!(state.prepare.is_empty());
    }

    #[test]
    fn unsupported_request_gets_request_not_supported() {
        let server: AttributeServer<8> = AttributeServer::new();
        let mut state: ConnectionState<4> = ConnectionState::new(23);
        let mut port = FakePort { sent: Vec::new() };

        // 0x14 is unassigned and has the Command bit (0x40) clear, so it's a Request.
        server.process_request(1, &mut state, &[0x14], &mut port);
        assert_eq!(port.sent, vec![vec![0x01, 0x14, 0x00, 0x00, 0x06]]);
    }

    #[test]
    fn unknown_command_is_silently_ignored() {
        let server: AttributeServer<8> = AttributeServer::new();
        let mut state: ConnectionState<4> = ConnectionState::new(23);
        let mut port = FakePort { sent: Vec::new() };

        // 0x54 is unassigned and has the Command bit (0x40) set.
        server.process_request(1, &mut state, &[0x54], &mut port);
        assert!(port.sent.is_empty());
    }

    #[test]
    fn read_by_type_record_length_never_overflows_its_wire_byte() {
        fn big_value_cb(ctx: &mut AccessContext<'_>, _arg: usize) -> AccessResult {
            match ctx.operation {
                Operation::Read => AccessResult::Ok { data: &[0x42; 300] },
                Operation::Write => AccessResult::Ok { data: &[] },
            }
        }

        let server: AttributeServer<8> = AttributeServer::new();
        {
            let mut table = server.table();
            table
                .register_by_uuid16(Uuid16(0x2A00), Permissions::READ, big_value_cb, 0)
                .unwrap();
        }
        // Negotiate a large MTU so the 300-byte value wouldn't otherwise be clamped by it.
        let mut state: ConnectionState<4> = ConnectionState::new(600);
        let mut port = FakePort { sent: Vec::new() };
        server.process_request(1, &mut state, &[0x02, 0x58, 0x02], &mut port);

        port.sent.clear();
        server.process_request(
            1,
            &mut state,
            &[0x08, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x2A],
            &mut port,
        );

        let rsp = &port.sent[0];
        assert_eq!(rsp[0], 0x09);
        // length byte (2-byte handle + value, capped so the record fits in one wire byte).
        assert_eq!(rsp[1], 255);
        assert_eq!(rsp.len() - 2, 255);
    }
}
