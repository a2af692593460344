//! SDP connection management
//!
//! Every SDP channel, client or server side, is tracked as a [`PeerConnection`]
//! moving through `Idle → ConnSetup → Config → Connected → Disconnect`.
//! Configuration needs both halves: our request accepted by the peer and the
//! peer's request answered by us.

use super::SdpError;
use super::fragment::PendingFragment;
use crate::BluetoothAddress;
use crate::constants::{DEFAULT_MTU, MAX_CONNECTIONS, MIN_MTU};
use crate::l2cap::ChannelId;
use heapless::Vec;

/// Which side of SDP the local device plays on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionRole {
    /// Local device sends requests
    Client,
    /// Local device answers requests
    Server,
}

/// Connection life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Created, nothing sent yet
    #[default]
    Idle,
    /// Waiting for the connect confirmation
    ConnSetup,
    /// Exchanging configuration requests
    Config,
    /// Open for SDP traffic
    Connected,
    /// Being torn down; never reused
    Disconnect,
}

/// Progress of one configuration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationState {
    /// Not yet configured
    #[default]
    NotConfigured,
    /// Configuration in progress
    InProgress,
    /// Configuration complete
    Complete,
}

/// Configuration state tracking flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationFlags {
    /// Our configuration request
    pub local_state: ConfigurationState,
    /// The peer's configuration request
    pub remote_state: ConfigurationState,
}

impl ConfigurationFlags {
    /// Whether both directions are done
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.local_state == ConfigurationState::Complete
            && self.remote_state == ConfigurationState::Complete
    }
}

/// One SDP channel to a peer
#[derive(Debug, Clone)]
pub struct PeerConnection {
    peer: BluetoothAddress,
    channel: ChannelId,
    role: ConnectionRole,
    state: ConnectionState,
    config: ConfigurationFlags,
    mtu: u16,
    pending: Option<PendingFragment>,
    expected_disconnect: bool,
}

impl PeerConnection {
    fn new(peer: BluetoothAddress, channel: ChannelId, role: ConnectionRole) -> Self {
        Self {
            peer,
            channel,
            role,
            state: ConnectionState::Idle,
            config: ConfigurationFlags::default(),
            mtu: DEFAULT_MTU,
            pending: None,
            expected_disconnect: false,
        }
    }

    /// Remote device
    #[must_use]
    pub const fn peer(&self) -> BluetoothAddress {
        self.peer
    }

    /// L2CAP channel
    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Local role
    #[must_use]
    pub const fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration progress
    #[must_use]
    pub const fn configuration(&self) -> ConfigurationFlags {
        self.config
    }

    /// Peer's receive MTU
    #[must_use]
    pub const fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Whether SDP PDUs may flow
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Unsent remainder of a server response
    pub fn pending_fragment(&mut self) -> &mut Option<PendingFragment> {
        &mut self.pending
    }

    /// Whether the local side started the disconnect and expects nothing more
    #[must_use]
    pub const fn expected_disconnect(&self) -> bool {
        self.expected_disconnect
    }

    /// `connect` was issued; waiting for the confirmation
    pub fn connecting(&mut self) {
        self.state = ConnectionState::ConnSetup;
    }

    /// Channel is up; configuration starts with our request in flight
    pub fn configuring(&mut self) {
        self.state = ConnectionState::Config;
        self.config.local_state = ConfigurationState::InProgress;
    }

    /// Peer accepted our configuration; returns `true` when this completed configuration
    pub fn local_configured(&mut self) -> bool {
        self.config.local_state = ConfigurationState::Complete;
        self.finish_configuration()
    }

    /// We answered the peer's configuration; returns `true` when this completed configuration
    pub fn remote_configured(&mut self, mtu: Option<u16>) -> bool {
        if let Some(mtu) = mtu {
            self.mtu = mtu.max(MIN_MTU);
        }
        self.config.remote_state = ConfigurationState::Complete;
        self.finish_configuration()
    }

    fn finish_configuration(&mut self) -> bool {
        if self.config.is_complete() && self.state == ConnectionState::Config {
            self.state = ConnectionState::Connected;
            true
        } else {
            false
        }
    }

    /// Start tearing down; `expected` marks a local, orderly close
    pub fn disconnecting(&mut self, expected: bool) {
        self.state = ConnectionState::Disconnect;
        self.expected_disconnect = expected;
        self.pending = None;
    }
}

/// All SDP connections
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: Vec<PeerConnection, MAX_CONNECTIONS>,
}

impl ConnectionManager {
    /// Create an empty manager
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    /// Track a new connection
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` when `MAX_CONNECTIONS` are in use.
    pub fn create(
        &mut self,
        peer: BluetoothAddress,
        channel: ChannelId,
        role: ConnectionRole,
    ) -> Result<&mut PeerConnection, SdpError> {
        if self.find(channel).is_some() {
            return Err(SdpError::InvalidParameter);
        }
        self.connections
            .push(PeerConnection::new(peer, channel, role))
            .map_err(|_| SdpError::QueueFull)?;
        debug!("[CONN] New {:?} connection on channel {:#x}", role, channel);
        self.connections.last_mut().ok_or(SdpError::QueueFull)
    }

    /// Look up by channel
    pub fn find(&mut self, channel: ChannelId) -> Option<&mut PeerConnection> {
        self.connections.iter_mut().find(|c| c.channel == channel)
    }

    /// Live connection to `peer` in `role`; connections being torn down are skipped
    pub fn find_by_peer(
        &mut self,
        peer: BluetoothAddress,
        role: ConnectionRole,
    ) -> Option<&mut PeerConnection> {
        self.connections.iter_mut().find(|c| {
            c.peer == peer && c.role == role && c.state != ConnectionState::Disconnect
        })
    }

    /// Forget a connection
    pub fn remove(&mut self, channel: ChannelId) -> Option<PeerConnection> {
        let index = self.connections.iter().position(|c| c.channel == channel)?;
        debug!("[CONN] Removed connection on channel {:#x}", channel);
        Some(self.connections.swap_remove(index))
    }

    /// Number of tracked connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Iterate connections
    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> + '_ {
        self.connections.iter()
    }
}
