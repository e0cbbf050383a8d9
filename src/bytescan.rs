//! NAL segmenter (spec.md §4.2). Finds Annex-B start codes in a rolling
//! buffer and yields byte spans; codec-specific parsing happens downstream.

pub struct StartCodeScanner {
    buffer: Vec<u8>,
    position: usize,
    /// Total bytes ever drained via `consume_processed`, so `NalSpan`
    /// offsets can be translated into absolute stream file offsets.
    consumed_total: u64,
    /// Set once the caller has signalled no more data is coming.
    at_end: bool,
}

impl StartCodeScanner {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            position: 0,
            consumed_total: 0,
            at_end: false,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn find_next_start_code(&mut self) -> Option<(usize, u8)> {
        while self.position + 2 < self.buffer.len() {
            if self.buffer[self.position] == 0x00 && self.buffer[self.position + 1] == 0x00 {
                if self.position + 3 < self.buffer.len()
                    && self.buffer[self.position + 2] == 0x00
                    && self.buffer[self.position + 3] == 0x01
                {
                    let pos = self.position;
                    self.position += 4;
                    return Some((pos, 4));
                } else if self.buffer[self.position + 2] == 0x01 {
                    let pos = self.position;
                    self.position += 3;
                    return Some((pos, 3));
                }
            }
            self.position += 1;
        }
        None
    }

    /// Returns the next complete NAL span, if a following start code (or
    /// end of buffered data after a `finish()`) delimits it. Incomplete
    /// trailing data is left in the buffer for a subsequent `push`.
    pub fn next_nal_unit(&mut self) -> Option<NalSpan> {
        let (start_pos, start_code_len) = self.find_next_start_code()?;
        let data_start = start_pos + start_code_len as usize;

        let saved_pos = self.position;
        let next_start = self.find_next_start_code();

        let data_end = if let Some((next_pos, _)) = next_start {
            self.position = next_pos;
            next_pos
        } else if self.at_end {
            self.buffer.len()
        } else {
            self.position = saved_pos;
            return None;
        };

        if data_start >= data_end {
            self.position = saved_pos;
            return None;
        }

        Some(NalSpan {
            start_pos,
            start_code_len,
            data_start,
            data_end,
            file_offset: self.consumed_total + start_pos as u64,
        })
    }

    pub fn get_nal_data(&self, span: &NalSpan) -> &[u8] {
        &self.buffer[span.data_start..span.data_end]
    }

    /// Marks that no further bytes will be pushed: the scanner may now
    /// treat the remainder of the buffer as a final, complete trailing NAL
    /// (spec.md §4.2 "a final 'trailing' NAL at EOF is permitted").
    pub fn finish(&mut self) {
        self.at_end = true;
    }

    pub fn consume_processed(&mut self, up_to: usize) {
        if up_to > 0 {
            self.buffer.drain(0..up_to);
            self.position = self.position.saturating_sub(up_to);
            self.consumed_total += up_to as u64;
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.position = 0;
        self.consumed_total = 0;
        self.at_end = false;
    }
}

#[derive(Debug, Clone)]
pub struct NalSpan {
    pub start_pos: usize,
    pub start_code_len: u8,
    pub data_start: usize,
    pub data_end: usize,
    pub file_offset: u64,
}

impl NalSpan {
    pub fn len(&self) -> usize {
        self.data_end - self.data_start
    }

    pub fn is_empty(&self) -> bool {
        self.data_end == self.data_start
    }
}

impl Default for StartCodeScanner {
    fn default() -> Self {
        Self::new()
    }
}
