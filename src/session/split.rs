use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::protocol::{constants::MAX_SPLIT_COUNT, packet::DecodeError};
use crate::transport::encapsulated_packet::SplitInfo;

#[derive(Debug)]
struct SplitBuffer {
    fragments: Vec<Option<Bytes>>,
    filled: usize,
}

impl SplitBuffer {
    fn new(count: u32) -> Self {
        Self {
            fragments: vec![None; count as usize],
            filled: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.fragments.len()
    }

    fn concat(self) -> Bytes {
        let total = self
            .fragments
            .iter()
            .map(|f| f.as_ref().map_or(0, Bytes::len))
            .sum();
        let mut out = BytesMut::with_capacity(total);
        for fragment in self.fragments.into_iter().flatten() {
            out.extend_from_slice(&fragment);
        }
        out.freeze()
    }
}

/// Reassembly buffers keyed by split id.
///
/// Incomplete buffers are kept until their last fragment arrives; there is
/// no expiry.
#[derive(Debug, Default)]
pub struct SplitAssembler {
    buffers: HashMap<u32, SplitBuffer>,
}

impl SplitAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one fragment. Returns the concatenated message once every
    /// slot of its split id is filled, removing the buffer in the same step.
    pub fn add(&mut self, split: SplitInfo, fragment: Bytes) -> Result<Option<Bytes>, DecodeError> {
        let invalid = DecodeError::InvalidSplit {
            id: split.id,
            count: split.count,
            index: split.index,
        };
        if split.count == 0 || split.count > MAX_SPLIT_COUNT || split.index >= split.count {
            return Err(invalid);
        }

        let buffer = self
            .buffers
            .entry(split.id)
            .or_insert_with(|| SplitBuffer::new(split.count));
        if buffer.fragments.len() != split.count as usize {
            return Err(invalid);
        }

        let slot = &mut buffer.fragments[split.index as usize];
        if slot.is_none() {
            buffer.filled += 1;
        }
        *slot = Some(fragment);

        if !buffer.is_complete() {
            return Ok(None);
        }

        Ok(self.buffers.remove(&split.id).map(SplitBuffer::concat))
    }

    /// Number of split ids still waiting for fragments.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}
