//! Response fragmentation and reassembly
//!
//! A response larger than one PDU is kept on the connection as a
//! [`PendingFragment`]. Each sent chunk but the last carries a continuation
//! token naming the number of bytes still to send; the peer echoes it to get
//! the next chunk. The receiving side appends chunks to a [`Reassembly`].

use super::SdpPduId;
use super::protocol::ContinuationState;
use crate::constants::MAX_RESPONSE_SIZE;
use heapless::Vec;

/// A complete logical response payload
pub type ResponseBuffer = Vec<u8, MAX_RESPONSE_SIZE>;

/// Unsent remainder of a large response, held by a server connection
#[derive(Debug, Clone)]
pub struct PendingFragment {
    pdu: SdpPduId,
    total_records: u16,
    data: ResponseBuffer,
    offset: usize,
}

impl PendingFragment {
    /// Start sending `data` as the payload of `pdu` responses
    ///
    /// `total_records` is only meaningful for service search responses.
    #[must_use]
    pub const fn new(pdu: SdpPduId, total_records: u16, data: ResponseBuffer) -> Self {
        Self {
            pdu,
            total_records,
            data,
            offset: 0,
        }
    }

    /// Response PDU kind being fragmented
    #[must_use]
    pub const fn pdu(&self) -> SdpPduId {
        self.pdu
    }

    /// Total record count of a search response
    #[must_use]
    pub const fn total_records(&self) -> u16 {
        self.total_records
    }

    /// Bytes not yet sent
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether every byte has been sent
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next chunk of at most `max_len` bytes
    pub fn take(&mut self, max_len: usize) -> &[u8] {
        let start = self.offset;
        let end = start + max_len.min(self.remaining());
        self.offset = end;
        &self.data[start..end]
    }

    /// Continuation token for the current position: the remaining byte count,
    /// one byte when it fits, otherwise two bytes big-endian
    #[must_use]
    pub fn token(&self) -> ContinuationState {
        let remaining = self.remaining();
        let result = if remaining == 0 {
            Ok(ContinuationState::EMPTY)
        } else if let Ok(short) = u8::try_from(remaining) {
            ContinuationState::from_bytes(&[short])
        } else {
            let wide = u16::try_from(remaining).unwrap_or(u16::MAX);
            ContinuationState::from_bytes(&wide.to_be_bytes())
        };
        result.unwrap_or(ContinuationState::EMPTY)
    }

    /// Whether an echoed token resumes this fragment for a request answered by `pdu`
    #[must_use]
    pub fn resumes(&self, pdu: SdpPduId, token: &ContinuationState) -> bool {
        self.pdu == pdu && !self.is_complete() && self.token() == *token
    }
}

/// Receiving side of a fragmented response
#[derive(Debug, Clone, Default)]
pub struct Reassembly {
    data: ResponseBuffer,
    fragments: usize,
}

impl Reassembly {
    /// Create an empty buffer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            fragments: 0,
        }
    }

    /// Append one fragment
    ///
    /// # Errors
    ///
    /// Returns `Err(())` when the assembled response would exceed `MAX_RESPONSE_SIZE`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ()> {
        self.data.extend_from_slice(chunk)?;
        self.fragments += 1;
        Ok(())
    }

    /// Bytes assembled so far
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of fragments appended
    #[must_use]
    pub const fn fragments(&self) -> usize {
        self.fragments
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.data.clear();
        self.fragments = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> ResponseBuffer {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_split_then_reassemble_is_identity() {
        for len in [0usize, 1, 17, 255, 256, 300, 1000, MAX_RESPONSE_SIZE] {
            for chunk in [1usize, 7, 48, 100, 655] {
                let original = payload(len);
                let mut pending =
                    PendingFragment::new(SdpPduId::ServiceAttributeResponse, 0, original.clone());
                let mut assembled = Reassembly::new();
                loop {
                    let piece = pending.take(chunk);
                    assembled.push(piece).unwrap();
                    if pending.is_complete() {
                        break;
                    }
                }
                assert_eq!(assembled.data(), &original[..]);
                assert_eq!(assembled.fragments(), len.div_ceil(chunk).max(1));
            }
        }
    }

    #[test]
    fn test_token_encodes_remaining() {
        let mut pending = PendingFragment::new(SdpPduId::ServiceAttributeResponse, 0, payload(600));
        assert_eq!(pending.token().as_bytes(), &[0x02, 0x58]);
        let _ = pending.take(400);
        assert_eq!(pending.token().as_bytes(), &[200]);
        let _ = pending.take(400);
        assert!(pending.token().is_empty());
    }

    #[test]
    fn test_resume_requires_matching_token_and_kind() {
        let mut pending = PendingFragment::new(SdpPduId::ServiceAttributeResponse, 0, payload(300));
        let _ = pending.take(100);
        let token = pending.token();
        assert!(pending.resumes(SdpPduId::ServiceAttributeResponse, &token));
        assert!(!pending.resumes(SdpPduId::ServiceSearchAttributeResponse, &token));

        let stale = ContinuationState::from_bytes(&[0x01, 0x2C]).unwrap();
        assert!(!pending.resumes(SdpPduId::ServiceAttributeResponse, &stale));
    }

    #[test]
    fn test_reassembly_limit() {
        let mut assembled = Reassembly::new();
        assembled.push(&payload(MAX_RESPONSE_SIZE)).unwrap();
        assert!(assembled.push(&[0]).is_err());
        assembled.clear();
        assert!(assembled.data().is_empty());
    }
}
