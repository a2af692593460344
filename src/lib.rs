#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::too_many_lines)]

#[macro_use]
mod fmt;

mod address;
pub mod api;
pub mod constants;
mod host;
pub mod l2cap;
pub mod processor;
pub mod sdp;
pub mod timer;

use crate::constants::{
    DEFAULT_COMMAND_DISALLOWED_RETRIES, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_IDLE_TIMEOUT_MS,
    DEFAULT_MTU, MAX_SEARCH_RESULTS, TASK_QUEUE_DEPTH,
};
use crate::l2cap::{L2capTransport, TransportEvent};
use crate::sdp::protocol::SearchPattern;
use crate::sdp::record::AttributeValue;
use crate::sdp::{
    AttributeId, AttributeSelector, ConnectionManager, SdpClient, SdpError, SdpServer,
    ServiceAttributeCallback, ServiceRecordHandle, ServiceSearchAttributeCallback,
    ServiceSearchCallback, TransactionId,
};
use crate::timer::{TimerId, TimerService};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;

pub use address::{ADDRESS_STRING_LENGTH, BluetoothAddress};

/// Tuning values for an [`SdpHost`]
///
/// # Example
///
/// ```rust
/// use sdpbird::SdpOptions;
///
/// let options = SdpOptions {
///     idle_timeout_ms: 500,
///     ..SdpOptions::default()
/// };
/// assert_eq!(options.mtu, 672);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SdpOptions {
    /// Local receive MTU announced when configuring a channel
    pub mtu: u16,
    /// Time a connection may take to reach the connected state
    pub connect_timeout_ms: u32,
    /// Time an idle client connection is kept open
    pub idle_timeout_ms: u32,
    /// `MaximumAttributeByteCount` put into client attribute requests
    pub max_attribute_byte_count: u16,
    /// `MaximumServiceRecordCount` put into client search requests, at most `MAX_SEARCH_RESULTS`
    pub max_record_count: u16,
    /// Reconnect attempts after a "command disallowed" close
    pub command_disallowed_retries: u8,
}

impl Default for SdpOptions {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            max_attribute_byte_count: DEFAULT_MTU,
            max_record_count: MAX_SEARCH_RESULTS as u16,
            command_disallowed_retries: DEFAULT_COMMAND_DISALLOWED_RETRIES,
        }
    }
}

/// SDP state owned by the processor
///
/// Holds the local record store (inside the server), every connection, the
/// client request queue and the two collaborators. Only [`processor::run`]
/// touches it once the engine is running.
pub struct SdpHost<T: L2capTransport, S: TimerService> {
    pub(crate) server: SdpServer,
    pub(crate) connections: ConnectionManager,
    pub(crate) client: SdpClient,
    pub(crate) transport: T,
    pub(crate) timer: S,
    pub(crate) options: SdpOptions,
}

impl<T: L2capTransport, S: TimerService> SdpHost<T, S> {
    /// Create a host with default options
    pub fn new(transport: T, timer: S) -> Self {
        Self::with_options(transport, timer, SdpOptions::default())
    }

    /// Create a host with the given options
    pub fn with_options(transport: T, timer: S, options: SdpOptions) -> Self {
        Self {
            server: SdpServer::new(),
            connections: ConnectionManager::new(),
            client: SdpClient::new(),
            transport,
            timer,
            options,
        }
    }

    /// Get a reference to the options
    #[must_use]
    pub fn options(&self) -> &SdpOptions {
        &self.options
    }

    /// The local server and its record store
    #[must_use]
    pub fn server(&self) -> &SdpServer {
        &self.server
    }

    /// Open connections
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Outstanding client requests
    #[must_use]
    pub fn client(&self) -> &SdpClient {
        &self.client
    }

    /// The transport collaborator
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The timer collaborator
    #[must_use]
    pub fn timer(&self) -> &S {
        &self.timer
    }
}

/// SDP engine: the serial task queue and the facade's completion channel
///
/// `new` is `const`, so the engine can live in a `static`:
///
/// ```rust
/// use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
/// use sdpbird::SdpEngine;
///
/// static ENGINE: SdpEngine<CriticalSectionRawMutex> = SdpEngine::new();
/// ```
pub struct SdpEngine<M: RawMutex> {
    pub(crate) tasks: Channel<M, (CallId, Task), TASK_QUEUE_DEPTH>,
    pub(crate) completions: Channel<M, (CallId, Completion), TASK_QUEUE_DEPTH>,
    /// The API lock; guards the number of the last facade call
    pub(crate) api: Mutex<M, CallId>,
}

impl<M: RawMutex> SdpEngine<M> {
    /// Create an idle engine
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: Channel::new(),
            completions: Channel::new(),
            api: Mutex::new(NO_CALL),
        }
    }
}

impl<M: RawMutex> Default for SdpEngine<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of the facade call a task belongs to, echoed in its completion
pub(crate) type CallId = u32;

/// Call number of events posted without waiting
pub(crate) const NO_CALL: CallId = 0;

/// Work items executed one at a time by the processor
#[derive(Debug, Clone)]
pub(crate) enum Task {
    /// Allocate a new record
    CreateRecord,
    /// Remove an unregistered record
    DestroyRecord(ServiceRecordHandle),
    /// Store an encoded attribute value
    AddAttribute {
        handle: ServiceRecordHandle,
        id: AttributeId,
        value: AttributeValue,
    },
    /// Publish a record
    Register(ServiceRecordHandle),
    /// Withdraw a record
    Deregister(ServiceRecordHandle),
    /// Queue a client `ServiceSearchRequest`
    ServiceSearch {
        peer: BluetoothAddress,
        pattern: SearchPattern,
        callback: ServiceSearchCallback,
        context: usize,
    },
    /// Queue a client `ServiceAttributeRequest`
    ServiceAttribute {
        peer: BluetoothAddress,
        handle: ServiceRecordHandle,
        selector: AttributeSelector,
        callback: ServiceAttributeCallback,
        context: usize,
    },
    /// Queue a client `ServiceSearchAttributeRequest`
    ServiceSearchAttribute {
        peer: BluetoothAddress,
        pattern: SearchPattern,
        selector: AttributeSelector,
        callback: ServiceSearchAttributeCallback,
        context: usize,
    },
    /// Something happened on the transport (fire-and-forget)
    Transport(TransportEvent),
    /// A timer fired (fire-and-forget)
    TimerExpired(TimerId),
}

impl Task {
    /// Whether a facade caller waits for this task's [`Completion`]
    pub(crate) const fn wants_completion(&self) -> bool {
        !matches!(self, Self::Transport(_) | Self::TimerExpired(_))
    }
}

/// Results sent back to a waiting facade caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The operation succeeded
    Done,
    /// A record was created
    Record(ServiceRecordHandle),
    /// A client request was queued
    Queued(TransactionId),
    /// The operation failed
    Error(SdpError),
}
