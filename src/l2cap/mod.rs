//! L2CAP (Logical Link Control and Adaptation Protocol) Interface
//!
//! SDP runs over a connection-oriented L2CAP channel on PSM 0x0001. The engine
//! does not implement L2CAP itself; it drives a transport through
//! [`L2capTransport`] and is told what happened on the link through
//! [`TransportEvent`]s posted by the transport glue.

use crate::BluetoothAddress;
use crate::sdp::protocol::PduBuffer;

/// L2CAP Channel Identifier
pub type ChannelId = u16;

/// Errors reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No channel or buffer available
    NoResources,
    /// The channel does not exist or is not open
    NotConnected,
    /// The remote device or controller refused the operation
    Rejected,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoResources => write!(f, "No transport resources"),
            Self::NotConnected => write!(f, "Channel not connected"),
            Self::Rejected => write!(f, "Operation rejected"),
        }
    }
}

/// Reason given for an abnormal channel close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    /// The controller rejected the command (HCI Command Disallowed)
    CommandDisallowed,
    /// Both sides tried to set up the link at once (LMP Transaction Collision)
    StateCollision,
    /// Any other HCI reason code
    Other(u8),
}

impl DisconnectReason {
    /// Map an HCI error code
    #[must_use]
    pub const fn from_hci(code: u8) -> Self {
        match code {
            0x0C => Self::CommandDisallowed,
            0x23 | 0x2A => Self::StateCollision,
            other => Self::Other(other),
        }
    }
}

/// Something that happened on an SDP channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote device opened a channel to the local SDP server
    ConnectIndication {
        /// Remote device
        peer: BluetoothAddress,
        /// Channel allocated by the transport
        channel: ChannelId,
        /// Signaling identifier to answer with
        identifier: u8,
    },
    /// Result of a local `connect`
    ConnectConfirm {
        /// Channel returned by `connect`
        channel: ChannelId,
        /// Whether the remote accepted
        success: bool,
    },
    /// The remote sent its configuration request
    ConfigIndication {
        /// Channel
        channel: ChannelId,
        /// Signaling identifier to answer with
        identifier: u8,
        /// Remote receive MTU, when the option was present
        mtu: Option<u16>,
    },
    /// The remote answered the local configuration request
    ConfigConfirm {
        /// Channel
        channel: ChannelId,
        /// Whether the configuration was accepted
        success: bool,
    },
    /// The remote closed the channel
    DisconnectIndication {
        /// Channel
        channel: ChannelId,
        /// Signaling identifier to answer with
        identifier: u8,
    },
    /// A local `disconnect` completed
    DisconnectConfirm {
        /// Channel
        channel: ChannelId,
    },
    /// The link went away without an orderly disconnect
    AbnormalClose {
        /// Channel
        channel: ChannelId,
        /// Why the link failed
        reason: DisconnectReason,
    },
    /// One SDP PDU arrived
    Data {
        /// Channel
        channel: ChannelId,
        /// The PDU
        payload: PduBuffer,
    },
}

/// Outbound L2CAP operations used by the engine
///
/// Calls must not block; completion is reported later as a [`TransportEvent`].
pub trait L2capTransport {
    /// Open a channel to `peer` on `psm`
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued.
    fn connect(&mut self, peer: BluetoothAddress, psm: u16) -> Result<ChannelId, TransportError>;

    /// Accept an inbound connection
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    fn accept(&mut self, channel: ChannelId, identifier: u8) -> Result<(), TransportError>;

    /// Send the local configuration request announcing the local receive MTU
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    fn configure(&mut self, channel: ChannelId, mtu: u16) -> Result<(), TransportError>;

    /// Accept the remote configuration request
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    fn respond_configure(&mut self, channel: ChannelId, identifier: u8) -> Result<(), TransportError>;

    /// Send one SDP PDU
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not open.
    fn send(&mut self, channel: ChannelId, pdu: &[u8]) -> Result<(), TransportError>;

    /// Close a channel
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    fn disconnect(&mut self, channel: ChannelId) -> Result<(), TransportError>;

    /// Confirm a remote disconnect
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown.
    fn respond_disconnect(&mut self, channel: ChannelId, identifier: u8) -> Result<(), TransportError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{ChannelId, L2capTransport, TransportError};
    use crate::BluetoothAddress;
    use heapless::Vec;

    /// One recorded transport call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Op {
        Connect(BluetoothAddress, ChannelId),
        Accept(ChannelId),
        Configure(ChannelId, u16),
        RespondConfigure(ChannelId),
        Send(ChannelId, Vec<u8, 1024>),
        Disconnect(ChannelId),
        RespondDisconnect(ChannelId),
    }

    /// Transport double that records every call
    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub ops: Vec<Op, 64>,
        pub next_channel: ChannelId,
        pub refuse_connect: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                ops: Vec::new(),
                next_channel: 0x0040,
                refuse_connect: false,
            }
        }

        /// PDUs sent so far, in order
        pub fn sent(&self) -> impl Iterator<Item = (ChannelId, &[u8])> + '_ {
            self.ops.iter().filter_map(|op| match op {
                Op::Send(channel, pdu) => Some((*channel, &pdu[..])),
                _ => None,
            })
        }

        pub fn last_sent(&self) -> Option<&[u8]> {
            self.sent().last().map(|(_, pdu)| pdu)
        }

        fn record(&mut self, op: Op) {
            self.ops.push(op).unwrap();
        }
    }

    impl L2capTransport for MockTransport {
        fn connect(&mut self, peer: BluetoothAddress, _psm: u16) -> Result<ChannelId, TransportError> {
            if self.refuse_connect {
                return Err(TransportError::NoResources);
            }
            let channel = self.next_channel;
            self.next_channel += 1;
            self.record(Op::Connect(peer, channel));
            Ok(channel)
        }

        fn accept(&mut self, channel: ChannelId, _identifier: u8) -> Result<(), TransportError> {
            self.record(Op::Accept(channel));
            Ok(())
        }

        fn configure(&mut self, channel: ChannelId, mtu: u16) -> Result<(), TransportError> {
            self.record(Op::Configure(channel, mtu));
            Ok(())
        }

        fn respond_configure(&mut self, channel: ChannelId, _identifier: u8) -> Result<(), TransportError> {
            self.record(Op::RespondConfigure(channel));
            Ok(())
        }

        fn send(&mut self, channel: ChannelId, pdu: &[u8]) -> Result<(), TransportError> {
            self.record(Op::Send(channel, Vec::from_slice(pdu).unwrap()));
            Ok(())
        }

        fn disconnect(&mut self, channel: ChannelId) -> Result<(), TransportError> {
            self.record(Op::Disconnect(channel));
            Ok(())
        }

        fn respond_disconnect(&mut self, channel: ChannelId, _identifier: u8) -> Result<(), TransportError> {
            self.record(Op::RespondDisconnect(channel));
            Ok(())
        }
    }
}
