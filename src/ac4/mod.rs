//! AC-4 elementary-stream parsing (spec.md §4.5), grounded on
//! `parser_ac4_get_sync`/the per-frame read loop in
//! `examples/original_source/src/esparser/parser_ac4.c`. Unlike AVC/HEVC's
//! start-code NAL scanning, an AC-4 raw stream is already a back-to-back
//! sequence of self-delimiting sync frames (`ac4_syncword` + `frame_size`),
//! so this module's scanner walks sync-word-to-sync-word rather than
//! reusing `bytescan::StartCodeScanner`.

pub mod dsi;
pub mod tables;
pub mod toc;

pub use dsi::build_dac4;
pub use toc::{Ac4Toc, Presentation, SubstreamGroup};

use crate::config::{CodecConfig, ExternalTiming};
use crate::sample::{Dependencies, FrameType, NalInfo, PictureType, Sample, SampleFlags, SubSample};
use crate::{Error, Result};

const SYNC_BYTE: u8 = 0xac;

/// One fully-framed sync frame: the header bytes (sync word + frame_size
/// field, any 24-bit escape, and CRC word if present) plus the raw
/// `ac4_toc()`-and-substreams payload.
struct Ac4Frame {
    /// The complete on-wire bytes, sync word through (and including) any
    /// trailing CRC, exactly as they'll be embedded in the `Sample`.
    raw: Vec<u8>,
    toc: toc::Ac4Toc,
}

/// Scans a byte buffer for complete AC-4 sync frames, grounded on
/// `parser_ac4_get_sync`'s sync-word search plus the frame-length field
/// layout from the per-frame read loop (escape to a 24-bit length when the
/// 16-bit field reads `0xffff`).
struct FrameScanner {
    buf: Vec<u8>,
}

impl FrameScanner {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pops the next complete frame out of the buffer, if one is fully
    /// present. Resynchronizes past stray bytes that don't start a valid
    /// sync word rather than treating them as a hard error, matching the
    /// original's tolerant `parser_ac4_get_sync` search loop.
    fn next_frame(&mut self) -> Result<Option<Ac4Frame>> {
        loop {
            let Some(sync_at) = find_sync(&self.buf) else {
                // Keep only a sync-word-length tail in case it's a partial match.
                if self.buf.len() > 1 {
                    let keep_from = self.buf.len() - 1;
                    self.buf.drain(0..keep_from);
                }
                return Ok(None);
            };
            if sync_at > 0 {
                self.buf.drain(0..sync_at);
            }
            if self.buf.len() < 4 {
                return Ok(None);
            }

            let b_crc_present = self.buf[1] == 0x41;
            let mut header_len = 4usize;
            let mut frame_size = u16::from_be_bytes([self.buf[2], self.buf[3]]) as u32;
            if frame_size == 0xffff {
                if self.buf.len() < 7 {
                    return Ok(None);
                }
                frame_size = u32::from_be_bytes([0, self.buf[4], self.buf[5], self.buf[6]]);
                header_len = 7;
            }

            if frame_size == 0 {
                // Not a real frame (padding byte pattern); step past the sync
                // word and keep resynchronizing.
                self.buf.drain(0..2);
                continue;
            }

            let crc_len = if b_crc_present { 2 } else { 0 };
            let total_len = header_len + frame_size as usize + crc_len;
            if self.buf.len() < total_len {
                return Ok(None);
            }

            let raw: Vec<u8> = self.buf.drain(0..total_len).collect();
            let payload = &raw[header_len..header_len + frame_size as usize];
            let mut r = crate::bitreader::BitReader::new(payload);
            let toc = toc::parse_toc(&mut r)?;
            return Ok(Some(Ac4Frame { raw, toc }));
        }
    }

    fn finish(&mut self) {}
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == SYNC_BYTE && matches!(buf[i + 1], 0x40 | 0x41) {
            return Some(i);
        }
        i += 1;
    }
    None
}

pub struct Ac4Parser {
    scanner: FrameScanner,
    config: CodecConfig,
    timing: ExternalTiming,
    output_queue: Vec<Sample>,
    next_decode_index: u64,
    active_toc: Option<toc::Ac4Toc>,
    /// Raw bytes of the most recently parsed TOC's presentation/substream
    /// layout fingerprint (here: the frame's own TOC payload bytes), used
    /// to detect a substream-layout change the way `sps_raw` dedup does
    /// for AVC (spec.md §4.5's "treat a TOC change as a new sample
    /// description" note — AC-4 has no parameter-set id to key on).
    last_toc_fingerprint: Option<Vec<u8>>,
    pending_new_sd: bool,
    finished: bool,
}

impl Ac4Parser {
    pub fn new() -> Self {
        Self {
            scanner: FrameScanner::new(),
            config: CodecConfig::default(),
            timing: ExternalTiming::default(),
            output_queue: Vec::new(),
            next_decode_index: 0,
            active_toc: None,
            last_toc_fingerprint: None,
            pending_new_sd: false,
            finished: false,
        }
    }

    fn handle_frame(&mut self, frame: Ac4Frame) -> Result<()> {
        let fingerprint = toc_fingerprint(&frame.toc);
        let is_new_layout = self.last_toc_fingerprint.as_ref() != Some(&fingerprint);
        if is_new_layout {
            if self.last_toc_fingerprint.is_some() {
                self.pending_new_sd = true;
            }
            self.last_toc_fingerprint = Some(fingerprint);
        }

        let (num_units_in_tick, _time_scale) = frame
            .toc
            .time_scale()
            .unwrap_or((self.timing.num_units_in_tick.max(1), self.timing.time_scale.max(1)));

        let decode_index = self.next_decode_index;
        self.next_decode_index += 1;
        let dts = decode_index as i64 * num_units_in_tick.max(1) as i64;

        let size = frame.raw.len() as u32;
        let sync = frame.toc.b_iframe_global;

        let mut flags = SampleFlags::NONE;
        if sync {
            flags |= SampleFlags::SYNC;
        }
        if self.pending_new_sd {
            flags |= SampleFlags::NEW_SAMPLE_DESCRIPTION;
            self.pending_new_sd = false;
        }

        let nal_list = vec![NalInfo {
            es_file_offset: None,
            embedded: Some(frame.raw),
            size,
            start_code_size: 0,
        }];

        self.active_toc = Some(frame.toc);

        let sample = Sample {
            dts,
            cts: dts,
            duration: num_units_in_tick.max(1),
            size,
            flags,
            nal_list,
            dependencies: Dependencies::default(),
            picture_type: PictureType::Other,
            frame_type: if sync { FrameType::I } else { FrameType::P },
        };
        self.output_queue.push(sample);
        Ok(())
    }
}

impl Default for Ac4Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// A stable-enough identity for "has the substream/presentation layout
/// changed" without re-deriving a full structural diff: the TOC's
/// presentation count/config fields plus every substream's channel mode.
fn toc_fingerprint(toc: &toc::Ac4Toc) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(toc.bitstream_version as u8);
    out.push(toc.fs_index);
    out.push(toc.frame_rate_index);
    out.push(toc.presentations.len() as u8);
    for p in &toc.presentations {
        out.push(p.presentation_version as u8);
        out.push(p.presentation_config as u8);
        out.push(p.pres_ch_mode.unwrap_or(0xff));
    }
    out.push(toc.substream_groups.len() as u8);
    for g in &toc.substream_groups {
        for s in &g.substreams {
            out.push(s.ch_mode);
        }
    }
    out
}

impl crate::parser::Parser for Ac4Parser {
    fn init(&mut self, config: CodecConfig, timing: ExternalTiming) -> Result<()> {
        self.config = config;
        self.timing = timing;
        Ok(())
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.scanner.push(data);
        while let Some(frame) = self.scanner.next_frame()? {
            self.handle_frame(frame)?;
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.scanner.finish();
    }

    fn get_sample(&mut self) -> Result<Option<Sample>> {
        if self.output_queue.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.output_queue.remove(0)))
    }

    fn get_subsample(&self, sample: &Sample, index: usize) -> Option<SubSample> {
        let nal = sample.nal_list.get(index)?;
        Some(SubSample { offset_in_sample: 0, size: nal.size })
    }

    fn get_cfg(&self) -> Option<Vec<u8>> {
        let toc = self.active_toc.as_ref()?;
        if self.config.conformance_type.is_some() && self.config.conformance_type != Some(*b"ac-4") {
            return None;
        }
        Some(dsi::build_dac4(toc, &self.timing))
    }

    fn get_param(&self, name: &str) -> Option<String> {
        let toc = self.active_toc.as_ref()?;
        match name {
            "bitstream_version" => Some(toc.bitstream_version.to_string()),
            "n_presentations" => Some(toc.presentations.len().to_string()),
            "is_atmos" => Some(toc.is_atmos(0).to_string()),
            _ => None,
        }
    }
}
