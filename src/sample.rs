//! The access-unit/sample record handed back by `Parser::get_sample`
//! (spec.md §3 "Access-unit record", §6 `get_sample` contract).

/// Sample flags, OR-combined. A thin newtype over `u32` rather than a
/// `bitflags` dependency, matching the teacher's preference for
/// hand-rolled small types over macro-generated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags(pub u32);

impl SampleFlags {
    pub const NONE: SampleFlags = SampleFlags(0);
    pub const SYNC: SampleFlags = SampleFlags(1 << 0);
    pub const NEW_SAMPLE_DESCRIPTION: SampleFlags = SampleFlags(1 << 1);

    pub fn contains(self, other: SampleFlags) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for SampleFlags {
    type Output = SampleFlags;
    fn bitor(self, rhs: SampleFlags) -> SampleFlags {
        SampleFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SampleFlags {
    fn bitor_assign(&mut self, rhs: SampleFlags) {
        self.0 |= rhs.0;
    }
}

/// One constituent NAL (or frame, for AC-4) of an emitted sample.
#[derive(Debug, Clone)]
pub struct NalInfo {
    /// Offset into the source elementary stream, or `None` if the NAL body
    /// is only held in the in-memory `embedded` buffer (e.g. a rewritten
    /// SEI NAL).
    pub es_file_offset: Option<u64>,
    pub embedded: Option<Vec<u8>>,
    pub size: u32,
    pub start_code_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    IdrNoLeading,
    IdrWithLeading,
    IOnly,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    I,
    P,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dependencies {
    pub sample_depends_on: u8,
    pub sample_is_depended_on: u8,
    pub sample_has_redundancy: u8,
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub dts: i64,
    pub cts: i64,
    pub duration: u32,
    pub size: u32,
    pub flags: SampleFlags,
    pub nal_list: Vec<NalInfo>,
    pub dependencies: Dependencies,
    pub picture_type: PictureType,
    pub frame_type: FrameType,
}

/// A sub-range lookup into a previously emitted sample's NAL list
/// (`get_subsample` in spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct SubSample {
    pub offset_in_sample: u32,
    pub size: u32,
}
