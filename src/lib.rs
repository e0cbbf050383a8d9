//! Elementary-stream parsing core for AVC, HEVC and AC-4 (spec.md §1-§2):
//! NAL/AU recovery, parameter-set tracking, POC reordering, HRD timing, and
//! ISO-BMFF DSI synthesis, shared by a media-muxing library's codec-specific
//! front ends.

pub mod ac4;
pub mod avc;
pub mod bitreader;
pub mod bytescan;
pub mod config;
pub mod dsi;
pub mod eg;
pub mod error;
pub mod hevc;
pub mod paramstore;
pub mod parser;
pub mod poc;
pub mod sample;

pub use config::{CodecConfig, DsiType, ExternalTiming};
pub use error::{Error, Result};
pub use paramstore::{ParamStore, UpdateOutcome};
pub use parser::{make_parser, Parser};
pub use poc::PocReorderBuffer;
pub use sample::{Dependencies, FrameType, NalInfo, PictureType, Sample, SampleFlags, SubSample};
