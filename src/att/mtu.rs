//! Channel MTU negotiation (spec.md §4.5, §6: "Exchange MTU Request/Response").

/// Default ATT_MTU before any exchange takes place (Bluetooth Core Spec v4.2, Vol. 3, Part F,
/// Section 3.2.8).
pub const DEFAULT_MTU: u16 = 23;

/// Per-channel MTU state.
///
/// Once an MTU exchange completes, the MTU is frozen for the lifetime of the channel
/// (spec.md §3: "Channel MTU ... once exchanged, MTU is frozen for the channel's lifetime").
#[derive(Debug, Clone, Copy)]
pub struct MtuState {
    local_mtu: u16,
    mtu: u16,
    local_mtu_sent: bool,
}

impl MtuState {
    /// Creates fresh MTU state for a new connection, advertising `local_mtu` as this server's
    /// preferred MTU once the peer initiates an exchange.
    pub fn new(local_mtu: u16) -> Self {
        Self {
            local_mtu,
            mtu: DEFAULT_MTU,
            local_mtu_sent: false,
        }
    }

    /// The currently effective MTU, bounding every outbound PDU on this channel.
    pub fn current(&self) -> u16 {
        self.mtu
    }

    /// Whether the local MTU has already been sent to the peer (MTU exchange may only complete
    /// once).
    pub fn local_mtu_sent(&self) -> bool {
        self.local_mtu_sent
    }

    /// Processes an incoming Exchange MTU Request, adopting `min(local, peer)` as the channel
    /// MTU and returning the local MTU value to send back.
    pub fn exchange(&mut self, peer_mtu: u16) -> u16 {
        self.mtu = self.local_mtu.min(peer_mtu).max(DEFAULT_MTU);
        self.local_mtu_sent = true;
        self.local_mtu
    }
}

impl Default for MtuState {
    fn default() -> Self {
        Self::new(DEFAULT_MTU)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopts_minimum_of_both_sides() {
        let mut mtu = MtuState::new(100);
        let local = mtu.exchange(64);
        assert_eq!(local, 100);
        assert_eq!(mtu.current(), 64);
        assert!(mtu.local_mtu_sent());
    }

    #[test]
    fn starts_at_default() {
        let mtu = MtuState::default();
        assert_eq!(mtu.current(), DEFAULT_MTU);
        assert!(!mtu.local_mtu_sent());
    }
}
