//! # Payload Allocator
//!
//! A bump allocator over the bytes that follow the particle header.
//!
//! Every enabled module asks for a payload. The allocator sorts the requests
//! into stages (type data, noise, modifiers, auxiliary, taper), keeps
//! declaration order inside a stage, and bumps an offset through them.
//! The result is a [`PayloadLayout`]: the record stride plus one
//! `(tag, offset, size)` entry per module.
//!
//! ```text
//! | BaseParticle | type data | noise | src mod | tgt mod | aux | taper |
//! 0              HEADER_SIZE                                    stride
//! ```

use crate::error::{LayoutError, LayoutResult};
use crate::particle::HEADER_SIZE;

/// Every payload is padded to this alignment.
const PAYLOAD_ALIGN: usize = 4;

/// Identifies the module owning a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadTag {
    /// Beam type data (state + interpolation points).
    BeamTypeData,
    /// Trail type data (chain links).
    TrailTypeData,
    /// Beam noise slots.
    Noise,
    /// Source-side anchor modifier.
    SourceModifier,
    /// Target-side anchor modifier.
    TargetModifier,
    /// Four dynamic-parameter floats.
    DynamicParameter,
    /// Per-vertex taper values.
    Taper,
}

impl PayloadTag {
    /// Stage this payload is placed in.
    #[inline]
    #[must_use]
    pub const fn stage(self) -> PayloadStage {
        match self {
            Self::BeamTypeData | Self::TrailTypeData => PayloadStage::TypeData,
            Self::Noise => PayloadStage::Noise,
            Self::SourceModifier | Self::TargetModifier => PayloadStage::Modifier,
            Self::DynamicParameter => PayloadStage::Auxiliary,
            Self::Taper => PayloadStage::Taper,
        }
    }
}

/// Placement stage; payloads are laid out in ascending stage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PayloadStage {
    /// Directly after the header.
    TypeData = 0,
    /// Immediately after type data.
    Noise = 1,
    /// Modifiers, in declaration order.
    Modifier = 2,
    /// Other per-particle module data.
    Auxiliary = 3,
    /// Always last.
    Taper = 4,
}

/// A module's request for payload bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadRequest {
    /// Owner of the payload.
    pub tag: PayloadTag,
    /// Requested size in bytes. Negative sizes are rejected.
    pub size: isize,
    /// Pin the payload at this record offset instead of bumping.
    pub fixed_offset: Option<usize>,
}

/// One placed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Owner of the payload.
    pub tag: PayloadTag,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Size in bytes (padded).
    pub size: usize,
}

impl LayoutEntry {
    #[inline]
    const fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    const fn overlaps(&self, offset: usize, size: usize) -> bool {
        size > 0 && self.size > 0 && offset < self.end() && self.offset < offset + size
    }
}

/// Final per-particle layout of an emitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadLayout {
    stride: usize,
    entries: Vec<LayoutEntry>,
}

impl PayloadLayout {
    /// Record stride in bytes (header included).
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Header size in bytes.
    #[inline]
    #[must_use]
    pub const fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Placed payloads, in record order.
    #[must_use]
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Entry for a tag.
    #[must_use]
    pub fn entry(&self, tag: PayloadTag) -> Option<&LayoutEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// Offset of a tag's payload.
    #[must_use]
    pub fn offset_of(&self, tag: PayloadTag) -> Option<usize> {
        self.entry(tag).map(|e| e.offset)
    }

    /// True if the tag was placed with a non-zero size.
    #[must_use]
    pub fn contains(&self, tag: PayloadTag) -> bool {
        self.entry(tag).is_some_and(|e| e.size > 0)
    }
}

/// Collects payload requests and computes a [`PayloadLayout`].
///
/// # Example
///
/// ```rust,ignore
/// let layout = PayloadAllocator::new()
///     .request(PayloadTag::BeamTypeData, 100)
///     .request(PayloadTag::Taper, 20)
///     .allocate()?;
/// assert_eq!(layout.offset_of(PayloadTag::BeamTypeData), Some(HEADER_SIZE));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PayloadAllocator {
    requests: Vec<PayloadRequest>,
}

impl PayloadAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bumped request.
    #[must_use]
    pub fn request(mut self, tag: PayloadTag, size: isize) -> Self {
        self.requests.push(PayloadRequest { tag, size, fixed_offset: None });
        self
    }

    /// Adds a request pinned at `offset`.
    #[must_use]
    pub fn request_at(mut self, tag: PayloadTag, size: isize, offset: usize) -> Self {
        self.requests.push(PayloadRequest { tag, size, fixed_offset: Some(offset) });
        self
    }

    /// Adds a prepared request.
    pub fn push(&mut self, request: PayloadRequest) {
        self.requests.push(request);
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when nothing was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Places every request.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::NegativeSize`] if a request has a negative size.
    /// - [`LayoutError::Overlap`] if a tag repeats or pinned ranges collide.
    /// - [`LayoutError::InsideHeader`] if a pinned offset lands in the header.
    pub fn allocate(self) -> LayoutResult<PayloadLayout> {
        let mut requests = self.requests;

        for (i, req) in requests.iter().enumerate() {
            if req.size < 0 {
                return Err(LayoutError::NegativeSize { tag: req.tag, size: req.size });
            }
            if let Some(prev) = requests[..i].iter().find(|r| r.tag == req.tag) {
                return Err(LayoutError::Overlap { tag: req.tag, other: prev.tag });
            }
        }

        // Stable: declaration order survives inside a stage.
        requests.sort_by_key(|r| r.tag.stage());

        let mut entries: Vec<LayoutEntry> = Vec::with_capacity(requests.len());

        // Pinned payloads first so bumped ones can flow around them.
        for req in &requests {
            let Some(offset) = req.fixed_offset else { continue };
            let size = pad(req.size.unsigned_abs());
            if offset < HEADER_SIZE {
                return Err(LayoutError::InsideHeader { tag: req.tag, offset, header: HEADER_SIZE });
            }
            if let Some(other) = entries.iter().find(|e| e.overlaps(offset, size)) {
                return Err(LayoutError::Overlap { tag: req.tag, other: other.tag });
            }
            entries.push(LayoutEntry { tag: req.tag, offset, size });
        }

        let mut cursor = pad(HEADER_SIZE);
        for req in requests.iter().filter(|r| r.fixed_offset.is_none()) {
            let size = pad(req.size.unsigned_abs());
            while let Some(pinned) = entries.iter().find(|e| e.overlaps(cursor, size)) {
                cursor = pad(pinned.end());
            }
            entries.push(LayoutEntry { tag: req.tag, offset: cursor, size });
            cursor += size;
        }

        entries.sort_by_key(|e| (e.offset, e.tag.stage()));
        let stride = pad(entries.iter().map(LayoutEntry::end).max().unwrap_or(HEADER_SIZE).max(HEADER_SIZE));

        Ok(PayloadLayout { stride, entries })
    }
}

#[inline]
const fn pad(size: usize) -> usize {
    (size + PAYLOAD_ALIGN - 1) & !(PAYLOAD_ALIGN - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        let layout = PayloadAllocator::new()
            .request(PayloadTag::Taper, 20)
            .request(PayloadTag::TargetModifier, 40)
            .request(PayloadTag::SourceModifier, 40)
            .request(PayloadTag::Noise, 64)
            .request(PayloadTag::BeamTypeData, 100)
            .allocate()
            .unwrap();

        let h = HEADER_SIZE;
        assert_eq!(layout.offset_of(PayloadTag::BeamTypeData), Some(h));
        assert_eq!(layout.offset_of(PayloadTag::Noise), Some(h + 100));
        // Modifiers keep declaration order.
        assert_eq!(layout.offset_of(PayloadTag::TargetModifier), Some(h + 164));
        assert_eq!(layout.offset_of(PayloadTag::SourceModifier), Some(h + 204));
        assert_eq!(layout.offset_of(PayloadTag::Taper), Some(h + 244));
        assert_eq!(layout.stride(), h + 264);
    }

    #[test]
    fn test_negative_size_rejected() {
        let err = PayloadAllocator::new()
            .request(PayloadTag::BeamTypeData, 100)
            .request(PayloadTag::Noise, -4)
            .allocate()
            .unwrap_err();
        assert_eq!(err, LayoutError::NegativeSize { tag: PayloadTag::Noise, size: -4 });
    }

    #[test]
    fn test_duplicate_tag_is_overlap() {
        let err = PayloadAllocator::new()
            .request(PayloadTag::Taper, 8)
            .request(PayloadTag::Taper, 8)
            .allocate()
            .unwrap_err();
        assert!(matches!(err, LayoutError::Overlap { tag: PayloadTag::Taper, .. }));
    }

    #[test]
    fn test_pinned_overlap_rejected() {
        let err = PayloadAllocator::new()
            .request_at(PayloadTag::BeamTypeData, 64, HEADER_SIZE)
            .request_at(PayloadTag::Noise, 16, HEADER_SIZE + 32)
            .allocate()
            .unwrap_err();
        assert_eq!(
            err,
            LayoutError::Overlap { tag: PayloadTag::Noise, other: PayloadTag::BeamTypeData }
        );
    }

    #[test]
    fn test_pinned_inside_header_rejected() {
        let err = PayloadAllocator::new()
            .request_at(PayloadTag::Noise, 16, 8)
            .allocate()
            .unwrap_err();
        assert!(matches!(err, LayoutError::InsideHeader { offset: 8, .. }));
    }

    #[test]
    fn test_bumped_payload_flows_around_pinned() {
        let layout = PayloadAllocator::new()
            .request_at(PayloadTag::Taper, 8, HEADER_SIZE)
            .request(PayloadTag::BeamTypeData, 12)
            .allocate()
            .unwrap();
        assert_eq!(layout.offset_of(PayloadTag::Taper), Some(HEADER_SIZE));
        assert_eq!(layout.offset_of(PayloadTag::BeamTypeData), Some(HEADER_SIZE + 8));
    }

    #[test]
    fn test_sizes_are_padded() {
        let layout = PayloadAllocator::new()
            .request(PayloadTag::BeamTypeData, 5)
            .request(PayloadTag::Taper, 0)
            .allocate()
            .unwrap();
        assert_eq!(layout.entry(PayloadTag::BeamTypeData).unwrap().size, 8);
        assert!(!layout.contains(PayloadTag::Taper));
        assert_eq!(layout.stride(), HEADER_SIZE + 8);
    }

    #[test]
    fn test_header_only_layout() {
        let layout = PayloadAllocator::new().allocate().unwrap();
        assert_eq!(layout.stride(), HEADER_SIZE);
        assert!(layout.entries().is_empty());
    }
}
