//! Interleaved ribbon vertex and its declaration.
//!
//! ```text
//! offset  type    semantic
//!  0      float3  Position
//! 12      float3  OldPosition     (Normal slot)
//! 24      float3  Size            (Tangent slot)
//! 36      float2  Rotation, Sizer (BlendWeight slot)
//! 44      float4  Color           (TexCoord1)
//! 60      float4  TexCoord0       (U, V, U2, V2)
//! 76      float4  DynamicParam    (TexCoord2, optional)
//! ```

use bytemuck::{Pod, Zeroable};

/// Element format in the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// Two floats.
    Float2,
    /// Three floats.
    Float3,
    /// Four floats.
    Float4,
}

impl VertexFormat {
    /// Size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// Shader input slot an element binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    /// World position.
    Position,
    /// Previous-frame position.
    Normal,
    /// Size.
    Tangent,
    /// Rotation and sizer index.
    BlendWeight,
    /// Texture coordinate set `n`.
    TexCoord(u8),
}

/// One entry of the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    /// Byte offset in the vertex.
    pub offset: usize,
    /// Format.
    pub format: VertexFormat,
    /// Semantic.
    pub semantic: VertexSemantic,
}

const BASE_ELEMENTS: [VertexElement; 6] = [
    VertexElement { offset: 0, format: VertexFormat::Float3, semantic: VertexSemantic::Position },
    VertexElement { offset: 12, format: VertexFormat::Float3, semantic: VertexSemantic::Normal },
    VertexElement { offset: 24, format: VertexFormat::Float3, semantic: VertexSemantic::Tangent },
    VertexElement { offset: 36, format: VertexFormat::Float2, semantic: VertexSemantic::BlendWeight },
    VertexElement { offset: 44, format: VertexFormat::Float4, semantic: VertexSemantic::TexCoord(1) },
    VertexElement { offset: 60, format: VertexFormat::Float4, semantic: VertexSemantic::TexCoord(0) },
];

const DYNAMIC_ELEMENT: VertexElement =
    VertexElement { offset: 76, format: VertexFormat::Float4, semantic: VertexSemantic::TexCoord(2) };

/// The declaration the ribbon shader expects.
#[must_use]
pub fn declaration(dynamic: bool) -> Vec<VertexElement> {
    let mut elements = BASE_ELEMENTS.to_vec();
    if dynamic {
        elements.push(DYNAMIC_ELEMENT);
    }
    elements
}

/// Vertex stride for the declaration.
#[must_use]
pub const fn stride(dynamic: bool) -> usize {
    if dynamic {
        DynamicRibbonVertex::SIZE
    } else {
        RibbonVertex::SIZE
    }
}

/// One ribbon vertex without dynamic parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct RibbonVertex {
    /// World position after the pre-view translation.
    pub position: [f32; 3],
    /// Centerline point of the previous frame.
    pub old_position: [f32; 3],
    /// Tapered size.
    pub size: [f32; 3],
    /// Rotation, sizer index.
    pub rotation: [f32; 2],
    /// Particle color.
    pub color: [f32; 4],
    /// Tiled U, V, then untiled U2, V2.
    pub tex_coord: [f32; 4],
}

impl RibbonVertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Ribbon vertex followed by four dynamic-parameter floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DynamicRibbonVertex {
    /// Base vertex.
    pub base: RibbonVertex,
    /// Dynamic parameter values.
    pub dynamic: [f32; 4],
}

impl DynamicRibbonVertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Staging buffer holding interleaved vertices of one stride.
///
/// Reused across frames: `clear` keeps the allocation.
#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    bytes: Vec<u8>,
    dynamic: bool,
    count: usize,
}

impl VertexBuffer {
    /// Creates an empty buffer for the given declaration.
    #[must_use]
    pub fn new(dynamic: bool) -> Self {
        Self { bytes: Vec::new(), dynamic, count: 0 }
    }

    /// True when vertices carry dynamic parameters.
    #[must_use]
    pub const fn has_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Bytes per vertex.
    #[must_use]
    pub const fn stride(&self) -> usize {
        stride(self.dynamic)
    }

    /// Vertices written.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// True when nothing was written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drops every vertex, keeping capacity.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.count = 0;
    }

    /// Reserves room for `additional` vertices.
    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional * self.stride());
    }

    /// Appends a vertex. `dynamic` is ignored by a buffer without the
    /// dynamic element.
    #[inline]
    pub fn push(&mut self, vertex: &RibbonVertex, dynamic: [f32; 4]) {
        if self.dynamic {
            let full = DynamicRibbonVertex { base: *vertex, dynamic };
            self.bytes.extend_from_slice(bytemuck::bytes_of(&full));
        } else {
            self.bytes.extend_from_slice(bytemuck::bytes_of(vertex));
        }
        self.count += 1;
    }

    /// Vertex `i` without its dynamic parameters.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<RibbonVertex> {
        let start = i.checked_mul(self.stride())?;
        let bytes = self.bytes.get(start..start + RibbonVertex::SIZE)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Dynamic parameters of vertex `i`.
    #[must_use]
    pub fn dynamic(&self, i: usize) -> Option<[f32; 4]> {
        if !self.dynamic {
            return None;
        }
        let start = i.checked_mul(self.stride())? + RibbonVertex::SIZE;
        let bytes = self.bytes.get(start..start + 16)?;
        Some(bytemuck::pod_read_unaligned(bytes))
    }

    /// Upload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_at(bytes: &[u8], offset: usize) -> f32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    #[test]
    fn test_vertex_sizes() {
        assert_eq!(RibbonVertex::SIZE, 76);
        assert_eq!(DynamicRibbonVertex::SIZE, 92);
        assert_eq!(std::mem::align_of::<RibbonVertex>(), 4);
    }

    #[test]
    fn test_field_offsets_match_declaration() {
        let vertex = DynamicRibbonVertex {
            base: RibbonVertex {
                position: [1.0, 0.0, 0.0],
                old_position: [2.0, 0.0, 0.0],
                size: [3.0, 0.0, 0.0],
                rotation: [4.0, 0.0],
                color: [5.0, 0.0, 0.0, 0.0],
                tex_coord: [6.0, 0.0, 0.0, 0.0],
            },
            dynamic: [7.0, 0.0, 0.0, 0.0],
        };
        let bytes = bytemuck::bytes_of(&vertex);
        for (i, element) in declaration(true).iter().enumerate() {
            assert_eq!(float_at(bytes, element.offset), (i + 1) as f32, "{:?}", element.semantic);
        }
    }

    #[test]
    fn test_declaration_is_contiguous() {
        let elements = declaration(true);
        let mut end = 0;
        for element in &elements {
            assert_eq!(element.offset, end);
            end += element.format.size();
        }
        assert_eq!(end, stride(true));
        assert_eq!(declaration(false).len(), 6);
    }

    #[test]
    fn test_buffer_stride() {
        let vertex = RibbonVertex { position: [1.0, 2.0, 3.0], ..RibbonVertex::default() };

        let mut plain = VertexBuffer::new(false);
        plain.push(&vertex, [9.0; 4]);
        plain.push(&vertex, [9.0; 4]);
        assert_eq!(plain.as_bytes().len(), 2 * 76);
        assert_eq!(plain.dynamic(0), None);

        let mut dynamic = VertexBuffer::new(true);
        dynamic.push(&vertex, [9.0; 4]);
        dynamic.push(&vertex, [8.0; 4]);
        assert_eq!(dynamic.as_bytes().len(), 2 * 92);
        assert_eq!(dynamic.get(1), Some(vertex));
        assert_eq!(dynamic.dynamic(1), Some([8.0; 4]));
        assert_eq!(dynamic.get(2), None);

        dynamic.clear();
        assert!(dynamic.is_empty());
    }
}
