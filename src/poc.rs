//! Picture-order-count reorder buffer (spec.md §4.6), shared by the AVC and
//! HEVC parsers: both decode a POC per access unit and need the same
//! decode-order -> presentation-order remapping before they can hand back a
//! `cts`/`dts` pair. Grounded on the `avc_apoc_t_` ring buffer (decode-order
//! tag + POC pairs, a segmented doc->output-index map instead of the
//! original's paged `int*[4096]` table, a "reorder ready" heuristic that
//! walks back at most `ref_au_max` buffered entries once per insertion).

use std::collections::HashMap;

/// One buffered access unit: its decode-order tag and POC.
#[derive(Debug, Clone, Copy)]
struct Entry {
    doc: u64,
    poc: i64,
}

/// Reorders access units from decode order into presentation order using
/// picture order count, bounded by the maximum number of reference frames
/// the active parameter set declares.
pub struct PocReorderBuffer {
    buffered: Vec<Entry>,
    ref_au_max: usize,
    next_doc: u64,
    /// decode-order tag -> output index, built incrementally as entries
    /// become ready; a hash map stands in for the original's segmented
    /// page table since growth here never needs to reallocate existing
    /// entries either.
    doc_to_output: HashMap<u64, u64>,
    next_output_index: u64,
    min_poc_seen: Option<i64>,
}

impl PocReorderBuffer {
    pub fn new(ref_au_max: usize) -> Self {
        Self {
            buffered: Vec::new(),
            ref_au_max: ref_au_max.max(1),
            next_doc: 0,
            doc_to_output: HashMap::new(),
            next_output_index: 0,
            min_poc_seen: None,
        }
    }

    pub fn set_ref_au_max(&mut self, ref_au_max: usize) {
        self.ref_au_max = ref_au_max.max(1);
    }

    /// Registers a decoded access unit's POC and returns its decode-order
    /// tag (monotonically increasing, used by the caller to correlate the
    /// sample later handed out with its presentation-order index). Per
    /// spec.md §3 "POC reorder buffer": if `is_idr`, every picture still
    /// buffered from the previous GOP is flushed first, so a new GOP's
    /// POCs (which restart at/near 0) never get sorted into the tail of an
    /// unrelated, still-open reorder window.
    pub fn add(&mut self, poc: i64, is_idr: bool) -> u64 {
        if is_idr {
            self.flush();
        }

        let doc = self.next_doc;
        self.next_doc += 1;

        self.min_poc_seen = Some(self.min_poc_seen.map_or(poc, |m| m.min(poc)));

        self.buffered.push(Entry { doc, poc });
        self.buffered.sort_by_key(|e| e.poc);

        self.drain_ready();

        doc
    }

    /// spec.md §4.6 "reorder_min_ready": once more than `ref_au_max`
    /// pictures are buffered, the lowest-POC entry is guaranteed not to be
    /// overtaken by a not-yet-seen picture and can be assigned its output
    /// index.
    fn drain_ready(&mut self) {
        while self.buffered.len() > self.ref_au_max {
            let entry = self.buffered.remove(0);
            self.doc_to_output.insert(entry.doc, self.next_output_index);
            self.next_output_index += 1;
        }
    }

    /// Forces every remaining buffered picture out, in POC order. Call at
    /// end of stream.
    pub fn flush(&mut self) {
        self.buffered.sort_by_key(|e| e.poc);
        for entry in self.buffered.drain(..) {
            self.doc_to_output.insert(entry.doc, self.next_output_index);
            self.next_output_index += 1;
        }
    }

    /// The output (presentation) index for a decode-order tag, once it has
    /// become ready (via `add` accumulating enough lookahead, or `flush`).
    pub fn output_index(&self, doc: u64) -> Option<u64> {
        self.doc_to_output.get(&doc).copied()
    }

    pub fn reorder_num(&self) -> usize {
        self.buffered.len()
    }

    /// Lowest POC observed across the whole stream; used to recentre CTS
    /// offsets so they never go negative (spec.md §4.4 "CTS offset
    /// recentring").
    pub fn min_poc(&self) -> Option<i64> {
        self.min_poc_seen
    }

    pub fn need_adj_cts(&self) -> bool {
        self.min_poc_seen.map(|m| m < 0).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_pocs_pass_straight_through_once_ready() {
        let mut buf = PocReorderBuffer::new(1);
        let doc0 = buf.add(0, true);
        let doc1 = buf.add(4, false);
        let doc2 = buf.add(8, false);

        assert_eq!(buf.output_index(doc0), Some(0));
        assert_eq!(buf.output_index(doc1), Some(1));
        assert_eq!(buf.output_index(doc2), None); // still buffered as lookahead
        buf.flush();
        assert_eq!(buf.output_index(doc2), Some(2));
    }

    #[test]
    fn reordered_pocs_come_out_in_poc_order() {
        let mut buf = PocReorderBuffer::new(2);
        let doc_i = buf.add(0, true); // I, POC 0
        let doc_b1 = buf.add(8, false); // P, POC 8 (decode order 1, displays last of these three)
        let doc_b0 = buf.add(4, false); // B, POC 4 (decode order 2, displays before the P)

        buf.flush();

        let out_i = buf.output_index(doc_i).unwrap();
        let out_b0 = buf.output_index(doc_b0).unwrap();
        let out_b1 = buf.output_index(doc_b1).unwrap();

        assert!(out_i < out_b0);
        assert!(out_b0 < out_b1);
    }

    #[test]
    fn tracks_minimum_poc_for_cts_recentring() {
        let mut buf = PocReorderBuffer::new(2);
        buf.add(0, true);
        buf.add(-4, false);
        buf.add(8, false);
        assert_eq!(buf.min_poc(), Some(-4));
        assert!(buf.need_adj_cts());
    }

    /// A second IDR's POC restarts at 0, which would otherwise sort ahead
    /// of the first GOP's still-buffered, higher-POC pictures and corrupt
    /// their output order. `add(_, is_idr=true)` must flush the first GOP
    /// out before the second GOP's first picture is even buffered.
    #[test]
    fn idr_flushes_the_previous_gop_before_joining_the_new_one() {
        let mut buf = PocReorderBuffer::new(1);
        let gop1_i = buf.add(0, true);
        let gop1_p = buf.add(2, false); // still buffered as lookahead (ref_au_max=1)

        let gop2_i = buf.add(0, true); // new GOP's IDR: must flush gop1_p first

        assert_eq!(buf.output_index(gop1_i), Some(0));
        assert_eq!(
            buf.output_index(gop1_p),
            Some(1),
            "first GOP's trailing picture must be flushed, not reordered against the new GOP's POC 0"
        );

        buf.flush();
        assert_eq!(buf.output_index(gop2_i), Some(2));
    }
}
