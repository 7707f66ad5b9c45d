//! Outbound transmission contract (spec.md §4.5 "Transmit contract").

use super::{pdus::AttPdu, AttError, ErrorCode, Handle};
use crate::bytes::{ByteWriter, ToBytes};
use crate::Error;

/// An outbound transport for framed ATT PDUs.
///
/// Implemented by the L2CAP layer (out of scope, §1) in a real stack; this core only depends on
/// this narrow interface so it can be tested without one.
pub trait TransmitPort {
    /// Whether the underlying connection is still alive.
    ///
    /// The default assumes a connected transport; implementations backed by a channel that can
    /// be torn down mid-handler should override this.
    fn is_connected(&self) -> bool {
        true
    }

    /// Hands a fully framed PDU to the transport for transmission.
    ///
    /// Returns `Err(())` if the underlying transport could not accept the PDU (eg. its queue is
    /// full); this never happens because the connection vanished (see `is_connected`).
    fn transmit(&mut self, pdu: &[u8]) -> Result<(), ()>;
}

/// Encodes `pdu` into `buf` and hands it to `port`, applying the transmit contract of spec.md
/// §4.5: silently drop if not connected; on a transmit failure, retry once with an
/// `UnlikelyError` Error Response addressed at the PDU's own opcode/handle.
pub fn send(port: &mut dyn TransmitPort, buf: &mut [u8], pdu: &AttPdu<'_>) {
    if !port.is_connected() {
        return;
    }

    match encode(buf, pdu) {
        Ok(len) => {
            if port.transmit(&buf[..len]).is_err() {
                send_unlikely_error(port, buf, pdu.opcode().raw(), Handle::NULL);
            }
        }
        Err(_) => {
            // The PDU was already size-checked against the negotiated MTU by its builder; an
            // encoding failure here means that invariant was violated, which is a programming
            // error in this crate rather than something a peer can trigger.
            unreachable!("outbound PDU exceeded its own size check");
        }
    }
}

fn encode(buf: &mut [u8], pdu: &AttPdu<'_>) -> Result<usize, Error> {
    let mut writer = ByteWriter::new(buf);
    let space_before = writer.space_left();
    pdu.to_bytes(&mut writer)?;
    Ok(space_before - writer.space_left())
}

fn send_unlikely_error(port: &mut dyn TransmitPort, buf: &mut [u8], opcode: u8, handle: Handle) {
    use super::pdus::Opcode;

    let err = AttPdu::ErrorRsp {
        opcode: Opcode::from(opcode),
        handle,
        error_code: ErrorCode::UnlikelyError,
    };
    if let Ok(len) = encode(buf, &err) {
        let _ = port.transmit(&buf[..len]);
    }
}

/// Convenience used by the dispatcher to turn a handler's `Result<(), AttError>` into the PDU
/// actually sent, applying the "drop silently if not connected" and error-framing rules.
pub fn send_result(
    port: &mut dyn TransmitPort,
    buf: &mut [u8],
    provoking_opcode: super::Opcode,
    result: Result<AttPdu<'_>, AttError>,
) {
    if !port.is_connected() {
        return;
    }

    match result {
        Ok(pdu) => send(port, buf, &pdu),
        Err(att_err) => send(
            port,
            buf,
            &AttPdu::ErrorRsp {
                opcode: provoking_opcode,
                handle: att_err.handle(),
                error_code: att_err.error_code(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Opcode;

    struct FakePort {
        connected: bool,
        fail_next: bool,
        sent: Vec<Vec<u8>>,
    }

    impl TransmitPort for FakePort {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn transmit(&mut self, pdu: &[u8]) -> Result<(), ()> {
            if self.fail_next {
                self.fail_next = false;
                return Err(());
            }
            self.sent.push(pdu.to_vec());
            Ok(())
        }
    }

    #[test]
    fn drops_silently_when_not_connected() {
        let mut port = FakePort {
            connected: false,
            fail_next: false,
            sent: Vec::new(),
        };
        let mut buf = [0u8; 32];
        send_result(
            &mut port,
            &mut buf,
            Opcode::ReadReq,
            Ok(AttPdu::WriteRsp),
        );
        assert!(port.sent.is_empty());
    }

    #[test]
    fn retries_with_unlikely_error_on_transmit_failure() {
        let mut port = FakePort {
            connected: true,
            fail_next: true,
            sent: Vec::new(),
        };
        let mut buf = [0u8; 32];
        send_result(
            &mut port,
            &mut buf,
            Opcode::ReadReq,
            Ok(AttPdu::WriteRsp),
        );
        assert_eq!(port.sent.len(), 1);
        assert_eq!(port.sent[0][0], Opcode::ErrorRsp.raw());
        assert_eq!(port.sent[0][4], u8::from(ErrorCode::UnlikelyError));
    }

    #[test]
    fn error_result_is_framed_as_error_response() {
        let mut port = FakePort {
            connected: true,
            fail_next: false,
            sent: Vec::new(),
        };
        let mut buf = [0u8; 32];
        send_result(
            &mut port,
            &mut buf,
            Opcode::ReadReq,
            Err(AttError::new(ErrorCode::InvalidHandle, Handle::from_raw(5))),
        );
        assert_eq!(
            port.sent[0],
            vec![0x01, Opcode::ReadReq.raw(), 0x05, 0x00, 0x01]
        );
    }
}
