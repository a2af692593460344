//! `Sdpbird` Constants
//!
//! This module contains the capacities, protocol limits and default timings used
//! throughout the `Sdpbird` library. Every collection in the crate is a fixed-capacity
//! `heapless` container sized by one of these values.

/// SDP Protocol Service Multiplexer (PSM) for L2CAP
pub const SDP_PSM: u16 = 0x0001;

/// Default L2CAP MTU used when the peer does not request another value
pub const DEFAULT_MTU: u16 = 672;

/// Smallest MTU an L2CAP implementation must support
pub const MIN_MTU: u16 = 48;

/// Largest inbound or outbound PDU the engine buffers
pub const MAX_PDU_SIZE: usize = 1024;

/// SDP PDU header length (PDU ID, transaction ID, parameter length)
pub const PDU_HEADER_LENGTH: usize = 5;

/// Maximum number of opaque continuation state bytes
pub const MAX_CONTINUATION_STATE_LENGTH: usize = 16;

/// Room reserved at the end of every response for the continuation field
pub const CONTINUATION_FIELD_RESERVE: usize = 1 + MAX_CONTINUATION_STATE_LENGTH;

/// Maximum number of service records in the local store
pub const MAX_SERVICE_RECORDS: usize = 16;

/// Maximum number of attributes per service record
pub const MAX_ATTRIBUTES_PER_RECORD: usize = 32;

/// Maximum encoded size of one service record (all attribute IDs and values)
pub const MAX_RECORD_SIZE: usize = 512;

/// Maximum encoded size of a single attribute value
pub const MAX_ATTRIBUTE_VALUE_SIZE: usize = 256;

/// Maximum size of a logical (reassembled) response payload
pub const MAX_RESPONSE_SIZE: usize = 4096;

/// Maximum number of UUIDs in a service search pattern
pub const MAX_UUID_PATTERN: usize = 12;

/// Maximum number of attribute IDs in an attribute ID list selector
pub const MAX_ATTRIBUTE_IDS: usize = 32;

/// Maximum nesting depth followed when searching sequences for a UUID
pub const MAX_SEQUENCE_DEPTH: usize = 3;

/// Maximum number of handles a client collects from one service search
pub const MAX_SEARCH_RESULTS: usize = 16;

/// Maximum number of records a client collects from one service search attribute request
pub const MAX_SERVICE_RESULTS: usize = 8;

/// Maximum number of protocol descriptors decoded from one list
pub const MAX_PROTOCOL_DESCRIPTORS: usize = 4;

/// Maximum number of parameters decoded per protocol descriptor
pub const MAX_PROTOCOL_PARAMETERS: usize = 4;

/// Maximum number of additional protocol descriptor lists decoded
pub const MAX_ADDITIONAL_PROTOCOL_LISTS: usize = 2;

/// Maximum number of language base entries decoded
pub const MAX_LANGUAGE_BASES: usize = 4;

/// Maximum number of profile descriptors decoded
pub const MAX_PROFILE_DESCRIPTORS: usize = 4;

/// Maximum number of simultaneous SDP connections (client and server roles combined)
pub const MAX_CONNECTIONS: usize = 4;

/// Maximum number of outstanding client requests across all peers
pub const MAX_CLIENT_REQUESTS: usize = 8;

/// Depth of the serial task queue and the completion queue
pub const TASK_QUEUE_DEPTH: usize = 4;

/// First service record handle issued by the store (0x0000-0xFFFF are reserved)
pub const FIRST_RECORD_HANDLE: u32 = 0x0001_0000;

/// Default time allowed for a client connection to reach the connected state
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 10_000;

/// Default time an idle client connection is kept open before disconnecting
pub const DEFAULT_IDLE_TIMEOUT_MS: u32 = 2_000;

/// Default number of reconnect attempts after a "command disallowed" abnormal close
pub const DEFAULT_COMMAND_DISALLOWED_RETRIES: u8 = 1;

/// Primary language base attribute ID
pub const PRIMARY_LANGUAGE_BASE_ID: u16 = 0x0100;
