//! AC-3/E-AC-3 elementary-stream parsing and `dac3`/`dec3` synthesis
//! (ETSI TS 102 366 Annex F `AC3SpecificBox`/`EC3SpecificBox`), grounded on
//! the same frame-header-carries-everything model as
//! `dsi::aac`: AC-3/E-AC-3 frame headers are self-contained, so `Ac3Parser`/
//! `Ec3Parser` re-derive the DSI from the latest frame rather than tracking
//! a parameter-set store.

use crate::bitreader::{BitReader, BitWriter};
use crate::config::{CodecConfig, ExternalTiming};
use crate::sample::{Dependencies, FrameType, NalInfo, PictureType, Sample, SampleFlags, SubSample};
use crate::{Error, Result};

const SYNCWORD: u16 = 0x0b77;

/// Table 5.18 (A/52): frame size in 16-bit words, indexed
/// `[frmsizecod >> 1][fscod]`, for `fscod` 0=48kHz, 1=44.1kHz, 2=32kHz.
/// `frmsizecod`'s low bit (odd code) adds one extra word for the 44.1kHz
/// column only.
const FRAME_SIZE_WORDS: [[u16; 3]; 19] = [
    [64, 69, 96],
    [80, 87, 120],
    [96, 104, 144],
    [112, 121, 168],
    [128, 139, 192],
    [160, 174, 240],
    [192, 208, 288],
    [224, 243, 336],
    [256, 278, 384],
    [320, 348, 480],
    [384, 417, 576],
    [448, 487, 672],
    [512, 557, 768],
    [640, 696, 960],
    [768, 835, 1152],
    [896, 975, 1344],
    [1024, 1114, 1536],
    [1152, 1253, 1728],
    [1280, 1393, 1920],
];

fn frame_size_bytes(fscod: u8, frmsizecod: u8) -> Option<u32> {
    let row = FRAME_SIZE_WORDS.get((frmsizecod >> 1) as usize)?;
    let words = *row.get(fscod as usize)?;
    let words = if fscod == 1 && frmsizecod % 2 == 1 { words + 1 } else { words };
    Some(words as u32 * 2)
}

#[derive(Debug, Clone, Copy, Default)]
struct Ac3Header {
    fscod: u8,
    frmsizecod: u8,
    bsid: u8,
    bsmod: u8,
    acmod: u8,
    lfeon: bool,
    frame_len: u32,
}

fn acmod_channel_count(acmod: u8) -> u8 {
    match acmod {
        0 => 2, // dual mono, carried as two channels
        1 => 1,
        2 => 2,
        3 => 3,
        4 => 4,
        5 => 5,
        _ => 0,
    }
}

fn parse_ac3_header(r: &mut BitReader) -> Result<Ac3Header> {
    let syncword = r.read_bits(16);
    if syncword as u16 != SYNCWORD {
        return Err(Error::SyntaxError("AC-3 syncword mismatch".into()));
    }
    r.skip_bits(16); // crc1
    let fscod = r.read_bits(2) as u8;
    if fscod == 3 {
        return Err(Error::NotSupported("AC-3 reserved fscod".into()));
    }
    let frmsizecod = r.read_bits(6) as u8;
    let bsid = r.read_bits(5) as u8;
    let bsmod = r.read_bits(3) as u8;
    let acmod = r.read_bits(3) as u8;

    if (acmod & 0x1) != 0 && acmod != 1 {
        r.skip_bits(2); // cmixlev
    }
    if (acmod & 0x4) != 0 {
        r.skip_bits(2); // surmixlev
    }
    if acmod == 2 {
        r.skip_bits(2); // dsurmod
    }
    let lfeon = r.read_flag();

    let frame_len = frame_size_bytes(fscod, frmsizecod).ok_or(Error::SyntaxError("AC-3 invalid frmsizecod".into()))?;

    Ok(Ac3Header { fscod, frmsizecod, bsid, bsmod, acmod, lfeon, frame_len })
}

/// `AC3SpecificBox` (Annex F.3): a fixed 24-bit record.
pub fn build_dac3(h_fscod: u8, h_bsid: u8, h_bsmod: u8, h_acmod: u8, h_lfeon: bool, bit_rate_code: u8) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(2, h_fscod as u32);
    w.write_bits(5, h_bsid as u32);
    w.write_bits(3, h_bsmod as u32);
    w.write_bits(3, h_acmod as u32);
    w.write_bits(1, h_lfeon as u32);
    w.write_bits(5, bit_rate_code as u32);
    w.write_bits(5, 0); // reserved
    w.into_bytes()
}

#[derive(Debug, Clone, Copy, Default)]
struct Eac3Header {
    fscod: u8,
    acmod: u8,
    bsid: u8,
    lfeon: bool,
    frame_len: u32,
    numblkscod: u8,
}

fn parse_eac3_header(r: &mut BitReader) -> Result<Eac3Header> {
    let syncword = r.read_bits(16);
    if syncword as u16 != SYNCWORD {
        return Err(Error::SyntaxError("E-AC-3 syncword mismatch".into()));
    }
    let strmtyp = r.read_bits(2);
    if strmtyp == 3 {
        return Err(Error::NotSupported("E-AC-3 reserved strmtyp".into()));
    }
    let _substreamid = r.read_bits(3);
    let frmsiz = r.read_bits(11);
    let frame_len = (frmsiz + 1) * 2;

    let fscod = r.read_bits(2) as u8;
    let numblkscod = if fscod == 3 {
        r.skip_bits(2); // fscod2
        3
    } else {
        r.read_bits(2) as u8
    };

    let acmod = r.read_bits(3) as u8;
    let lfeon = r.read_flag();
    let bsid = r.read_bits(5) as u8;

    Ok(Eac3Header { fscod, acmod, bsid, lfeon, frame_len, numblkscod })
}

/// `EC3SpecificBox` (Annex F.6), a single independent-substream-only
/// rendition: this crate doesn't track dependent-substream bedding, so
/// `num_ind_sub` is always 1 and `num_dep_sub` always 0.
pub fn build_dec3(h: &Eac3Header, bit_rate_code: u16) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(13, bit_rate_code as u32); // data_rate
    w.write_bits(3, 0); // num_ind_sub - 1 = 0

    w.write_bits(2, h.fscod as u32);
    w.write_bits(2, blocks_per_sync_frame_code(h.numblkscod));
    w.write_bits(3, h.acmod as u32);
    w.write_bits(1, h.lfeon as u32);
    w.write_bits(3, 0); // reserved
    w.write_bits(1, 0); // num_dep_sub = 0
    w.write_bits(1, 0); // reserved
    w.into_bytes()
}

fn blocks_per_sync_frame_code(numblkscod: u8) -> u32 {
    numblkscod as u32
}

struct Scanner {
    buf: Vec<u8>,
}

impl Scanner {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
    fn find_sync(&self) -> Option<usize> {
        self.buf.windows(2).position(|w| w[0] == 0x0b && w[1] == 0x77)
    }
}

pub struct Ac3Parser {
    scanner: Scanner,
    config: CodecConfig,
    timing: ExternalTiming,
    output_queue: Vec<Sample>,
    next_decode_index: u64,
    active_header: Option<Ac3Header>,
    finished: bool,
}

impl Ac3Parser {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
            config: CodecConfig::default(),
            timing: ExternalTiming::default(),
            output_queue: Vec::new(),
            next_decode_index: 0,
            active_header: None,
            finished: false,
        }
    }

    fn next_frame(&mut self) -> Result<Option<(Vec<u8>, Ac3Header)>> {
        loop {
            let Some(sync_at) = self.scanner.find_sync() else {
                if self.scanner.buf.len() > 1 {
                    let keep_from = self.scanner.buf.len() - 1;
                    self.scanner.buf.drain(0..keep_from);
                }
                return Ok(None);
            };
            if sync_at > 0 {
                self.scanner.buf.drain(0..sync_at);
            }
            if self.scanner.buf.len() < 8 {
                return Ok(None);
            }
            let mut r = BitReader::new(&self.scanner.buf);
            let header = match parse_ac3_header(&mut r) {
                Ok(h) => h,
                Err(_) => {
                    self.scanner.buf.drain(0..2);
                    continue;
                }
            };
            if (self.scanner.buf.len() as u32) < header.frame_len {
                return Ok(None);
            }
            let frame: Vec<u8> = self.scanner.buf.drain(0..header.frame_len as usize).collect();
            return Ok(Some((frame, header)));
        }
    }
}

impl Default for Ac3Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::parser::Parser for Ac3Parser {
    fn init(&mut self, config: CodecConfig, timing: ExternalTiming) -> Result<()> {
        self.config = config;
        self.timing = timing;
        Ok(())
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.scanner.push(data);
        while let Some((frame, header)) = self.next_frame()? {
            self.active_header = Some(header);
            let decode_index = self.next_decode_index;
            self.next_decode_index += 1;
            let duration = 1536; // AC-3: 6 blocks * 256 samples
            let dts = decode_index as i64 * duration;
            let size = frame.len() as u32;
            self.output_queue.push(Sample {
                dts,
                cts: dts,
                duration: duration as u32,
                size,
                flags: SampleFlags::SYNC,
                nal_list: vec![NalInfo { es_file_offset: None, embedded: Some(frame), size, start_code_size: 0 }],
                dependencies: Dependencies::default(),
                picture_type: PictureType::Other,
                frame_type: FrameType::I,
            });
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
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
        let h = self.active_header?;
        Some(build_dac3(h.fscod, h.bsid, h.bsmod, h.acmod, h.lfeon, h.frmsizecod >> 1))
    }

    fn get_param(&self, name: &str) -> Option<String> {
        let h = self.active_header?;
        match name {
            "acmod" => Some(h.acmod.to_string()),
            "channels" => Some(acmod_channel_count(h.acmod).to_string()),
            "lfeon" => Some(h.lfeon.to_string()),
            _ => None,
        }
    }
}

pub struct Ec3Parser {
    scanner: Scanner,
    config: CodecConfig,
    timing: ExternalTiming,
    output_queue: Vec<Sample>,
    next_decode_index: u64,
    active_header: Option<Eac3Header>,
    finished: bool,
}

impl Ec3Parser {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
            config: CodecConfig::default(),
            timing: ExternalTiming::default(),
            output_queue: Vec::new(),
            next_decode_index: 0,
            active_header: None,
            finished: false,
        }
    }

    fn next_frame(&mut self) -> Result<Option<(Vec<u8>, Eac3Header)>> {
        loop {
            let Some(sync_at) = self.scanner.find_sync() else {
                if self.scanner.buf.len() > 1 {
                    let keep_from = self.scanner.buf.len() - 1;
                    self.scanner.buf.drain(0..keep_from);
                }
                return Ok(None);
            };
            if sync_at > 0 {
                self.scanner.buf.drain(0..sync_at);
            }
            if self.scanner.buf.len() < 8 {
                return Ok(None);
            }
            let mut r = BitReader::new(&self.scanner.buf);
            let header = match parse_eac3_header(&mut r) {
                Ok(h) => h,
                Err(_) => {
                    self.scanner.buf.drain(0..2);
                    continue;
                }
            };
            if (self.scanner.buf.len() as u32) < header.frame_len {
                return Ok(None);
            }
            let frame: Vec<u8> = self.scanner.buf.drain(0..header.frame_len as usize).collect();
            return Ok(Some((frame, header)));
        }
    }
}

impl Default for Ec3Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::parser::Parser for Ec3Parser {
    fn init(&mut self, config: CodecConfig, timing: ExternalTiming) -> Result<()> {
        self.config = config;
        self.timing = timing;
        Ok(())
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.scanner.push(data);
        while let Some((frame, header)) = self.next_frame()? {
            self.active_header = Some(header);
            let decode_index = self.next_decode_index;
            self.next_decode_index += 1;
            let blocks = match header.numblkscod {
                0 => 1,
                1 => 2,
                2 => 3,
                _ => 6,
            };
            let duration = blocks * 256;
            let dts = decode_index as i64 * duration as i64;
            let size = frame.len() as u32;
            self.output_queue.push(Sample {
                dts,
                cts: dts,
                duration,
                size,
                flags: SampleFlags::SYNC,
                nal_list: vec![NalInfo { es_file_offset: None, embedded: Some(frame), size, start_code_size: 0 }],
                dependencies: Dependencies::default(),
                picture_type: PictureType::Other,
                frame_type: FrameType::I,
            });
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
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
        let h = self.active_header?;
        Some(build_dec3(&h, 0))
    }

    fn get_param(&self, name: &str) -> Option<String> {
        let h = self.active_header?;
        match name {
            "acmod" => Some(h.acmod.to_string()),
            "channels" => Some(acmod_channel_count(h.acmod).to_string()),
            "lfeon" => Some(h.lfeon.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser as _;

    fn ac3_frame() -> Vec<u8> {
        // fscod=0 (48kHz), frmsizecod=0 -> 64 words -> 128 bytes.
        let mut w = BitWriter::new();
        w.write_bits(16, SYNCWORD as u32);
        w.write_bits(16, 0); // crc1
        w.write_bits(2, 0); // fscod
        w.write_bits(6, 0); // frmsizecod
        w.write_bits(5, 8); // bsid
        w.write_bits(3, 0); // bsmod
        w.write_bits(3, 2); // acmod: L/R
        w.write_bits(2, 0); // dsurmod (acmod==2)
        w.write_bits(1, 0); // lfeon
        let mut bytes = w.into_bytes();
        bytes.resize(128, 0);
        bytes
    }

    #[test]
    fn parses_one_ac3_frame() {
        let mut parser = Ac3Parser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        parser.feed(&ac3_frame()).unwrap();
        let sample = parser.get_sample().unwrap().expect("frame parsed");
        assert_eq!(sample.size, 128);
        assert_eq!(sample.duration, 1536);
    }

    #[test]
    fn get_cfg_emits_a_3_byte_dac3_record() {
        let mut parser = Ac3Parser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        parser.feed(&ac3_frame()).unwrap();
        let _ = parser.get_sample();
        let cfg = parser.get_cfg().expect("dac3 available");
        assert_eq!(cfg.len(), 3);
    }

    fn eac3_frame() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(16, SYNCWORD as u32);
        w.write_bits(2, 0); // strmtyp
        w.write_bits(3, 0); // substreamid
        let frmsiz_words = 63u32; // (frmsiz+1)*2 = 128 bytes
        w.write_bits(11, frmsiz_words);
        w.write_bits(2, 0); // fscod: 48kHz
        w.write_bits(2, 3); // numblkscod: 6 blocks
        w.write_bits(3, 2); // acmod
        w.write_bits(1, 0); // lfeon
        w.write_bits(5, 16); // bsid: E-AC-3
        let mut bytes = w.into_bytes();
        bytes.resize(128, 0);
        bytes
    }

    #[test]
    fn parses_one_eac3_frame() {
        let mut parser = Ec3Parser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        parser.feed(&eac3_frame()).unwrap();
        let sample = parser.get_sample().unwrap().expect("frame parsed");
        assert_eq!(sample.size, 128);
        assert_eq!(sample.duration, 1536);
    }
}
