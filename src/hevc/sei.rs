//! HEVC SEI messages use the identical `payloadType`/`payloadSize`
//! variable-length coding as AVC (Rec. ITU-T H.265 §7.3.5 mirrors H.264
//! §7.3.2.3.1 byte-for-byte), so the AVC parser is reused outright rather
//! than duplicated.

pub use crate::avc::sei::{SeiMessage, SeiPayload};
