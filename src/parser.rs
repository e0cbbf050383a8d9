//! The codec-agnostic `Parser` trait and its factory (spec.md §9 design
//! notes: "one trait, six concrete variants"). Each concrete parser owns its
//! own NAL/frame segmentation, parameter-set tracking and timing derivation;
//! this trait is just the seam a muxer drives them through.

use crate::config::{CodecConfig, ExternalTiming};
use crate::sample::{Sample, SubSample};
use crate::{Error, Result};

/// Common surface every codec-specific parser exposes to a muxing caller.
pub trait Parser {
    /// Applies construction-time configuration and any external timing
    /// override. Must be called before the first `feed`.
    fn init(&mut self, config: CodecConfig, timing: ExternalTiming) -> Result<()>;

    /// Appends newly available elementary-stream bytes.
    fn feed(&mut self, data: &[u8]) -> Result<()>;

    /// Signals that no further bytes will be fed; remaining buffered data
    /// is flushed as a final, possibly short, access unit/frame.
    fn finish(&mut self);

    /// Pulls the next fully assembled sample, if one is ready. `Ok(None)`
    /// means "no sample ready yet, feed more data"; after `finish()`, it
    /// means the stream is exhausted.
    fn get_sample(&mut self) -> Result<Option<Sample>>;

    /// Looks up a sub-range of a previously emitted sample's NAL list by
    /// index (spec.md §6 `get_subsample`).
    fn get_subsample(&self, sample: &Sample, index: usize) -> Option<SubSample>;

    /// The current decoder-specific-info record (`avcC`/`hvcC`/`dac4`/
    /// `esds`/...), if the active parameter sets are sufficient to build
    /// one.
    fn get_cfg(&self) -> Option<Vec<u8>>;

    /// Ad hoc named parameter lookup (width/height/profile/level/etc.),
    /// returned as display strings; the concrete type lives on the parser.
    fn get_param(&self, name: &str) -> Option<String>;

    /// The enhancement-layer DSI (`hvcE`/`avcE`), if a Dolby-Vision
    /// enhancement-layer sub-bitstream has been observed (SPEC_FULL.md
    /// §4.8). Most codecs never carry one; default is `None`.
    fn get_enhancement_cfg(&self) -> Option<Vec<u8>> {
        None
    }

    /// The Dolby-Vision `dvcC` record, if Dolby-Vision signalling (an RPU
    /// or enhancement-layer side-NAL, plus a caller-supplied `dv_profile`)
    /// has been observed. Default is `None`.
    fn get_dolby_vision_cfg(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Builds a `Parser` for the named codec. Matches spec.md §9's six-variant
/// factory: `avc`/`h264`, `hevc`/`h265`, `ac4`, `aac`, `ac3`, `ec3`.
pub fn make_parser(codec: &str) -> Result<Box<dyn Parser>> {
    match codec.to_ascii_lowercase().as_str() {
        "avc" | "h264" => Ok(Box::new(crate::avc::AvcParser::new())),
        "hevc" | "h265" => Ok(Box::new(crate::hevc::HevcParser::new())),
        "ac4" => Ok(Box::new(crate::ac4::Ac4Parser::new())),
        "aac" => Ok(Box::new(crate::dsi::aac::AacParser::new())),
        "ac3" => Ok(Box::new(crate::dsi::ac3::Ac3Parser::new())),
        "ec3" => Ok(Box::new(crate::dsi::ac3::Ec3Parser::new())),
        other => Err(Error::NotSupported(format!("unknown codec '{other}'"))),
    }
}
