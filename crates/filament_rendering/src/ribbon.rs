//! Strip assembly shared by the beam and trail tessellators.
//!
//! Every ribbon is a list of centerline points. Each point becomes two
//! vertices per sheet, and every sheet is its own strip. Consecutive strips
//! are joined by repeating the last index of one and the first of the next,
//! which costs 4 degenerate triangles.

use filament_effects::Emitter;
use filament_shared::{LinearColor, Vec3};

use crate::vertex::{RibbonVertex, VertexBuffer};
use crate::view::ViewContext;

/// One centerline point of a ribbon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RibbonPoint {
    /// Centerline position.
    pub center: Vec3,
    /// Centerline position of the previous frame.
    pub old_center: Vec3,
    /// Unit direction of the ribbon at this point.
    pub right: Vec3,
    /// Half width after tapering.
    pub width: f32,
    /// Particle rotation.
    pub rotation: f32,
    /// Particle color.
    pub color: LinearColor,
    /// Tiled texture coordinate along the ribbon.
    pub u: f32,
    /// Untiled texture coordinate along the ribbon, in `[0, 1]`.
    pub u2: f32,
    /// Dynamic parameter values.
    pub dynamic: [f32; 4],
}

/// Texture U for a point `distance` along a path of `length`.
///
/// A positive `tile_distance` tiles by world distance, otherwise the path
/// is tiled `tile` times.
#[must_use]
pub fn tex_u(distance: f32, length: f32, tile: u32, tile_distance: f32) -> (f32, f32) {
    let untiled = if length > 0.0 { distance / length } else { 0.0 };
    let tiled = if tile_distance > 0.0 { distance / tile_distance } else { untiled * tile.max(1) as f32 };
    (tiled, untiled)
}

/// Vertices and strip indices of one emitter for one frame.
#[derive(Debug, Clone, Default)]
pub struct RibbonBatch {
    /// Interleaved vertices.
    pub vertices: VertexBuffer,
    /// Triangle-strip indices.
    pub indices: Vec<u32>,
    strips: u32,
    ribbon_triangles: u32,
}

impl RibbonBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(dynamic: bool) -> Self {
        Self { vertices: VertexBuffer::new(dynamic), ..Self::default() }
    }

    /// Creates an empty batch with the declaration `emitter` needs.
    #[must_use]
    pub fn for_emitter(emitter: &Emitter) -> Self {
        let dynamic = match emitter {
            Emitter::Beam(beam) => beam.offsets().dynamic_parameter.is_some(),
            Emitter::Trail(trail) => trail.offsets().dynamic_parameter.is_some(),
        };
        Self::new(dynamic)
    }

    /// Clears the batch, keeping allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.strips = 0;
        self.ribbon_triangles = 0;
    }

    /// Strips written, one per sheet per ribbon.
    #[must_use]
    pub const fn strip_count(&self) -> u32 {
        self.strips
    }

    /// Triangles of the index strip, degenerates included.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.indices.len().saturating_sub(2) as u32
    }

    /// Visible triangles.
    #[must_use]
    pub const fn ribbon_triangles(&self) -> u32 {
        self.ribbon_triangles
    }

    /// Triangles spent joining strips.
    #[must_use]
    pub fn degenerate_triangles(&self) -> u32 {
        self.triangle_count() - self.ribbon_triangles
    }

    /// Appends `sheets` strips along `points`. Fewer than two points draw
    /// nothing.
    pub fn push_ribbon(&mut self, points: &[RibbonPoint], sheets: u32, view: &ViewContext) {
        if points.len() < 2 {
            return;
        }
        let sheets = sheets.max(1);
        self.vertices.reserve(points.len() * 2 * sheets as usize);
        for sheet in 0..sheets {
            self.push_strip(points, sheet, sheets, view);
        }
    }

    fn push_strip(&mut self, points: &[RibbonPoint], sheet: u32, sheets: u32, view: &ViewContext) {
        let first = self.vertices.len() as u32;
        if let Some(&last) = self.indices.last() {
            self.indices.push(last);
            self.indices.push(first);
        }

        for point in points {
            let up = view.up_vector(point.center, point.right);
            let up = ViewContext::sheet_up(up, point.right, sheet, sheets);
            for (edge, sign) in [(0.0f32, 1.0f32), (1.0, -1.0)] {
                let position = point.center + up * (point.width * sign) + view.pre_view_translation;
                let vertex = RibbonVertex {
                    position: position.to_array(),
                    old_position: (point.old_center + view.pre_view_translation).to_array(),
                    size: [point.width; 3],
                    rotation: [point.rotation, edge],
                    color: point.color.to_array(),
                    tex_coord: [point.u, edge, point.u2, edge],
                };
                self.indices.push(self.vertices.len() as u32);
                self.vertices.push(&vertex, point.dynamic);
            }
        }

        self.strips += 1;
        self.ribbon_triangles += (points.len() as u32 - 1) * 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32) -> RibbonPoint {
        RibbonPoint {
            center: Vec3::new(x, 0.0, 0.0),
            old_center: Vec3::new(x, 0.0, 0.0),
            right: Vec3::X,
            width: 2.0,
            rotation: 0.0,
            color: LinearColor::WHITE,
            u: x,
            u2: x,
            dynamic: [0.0; 4],
        }
    }

    #[test]
    fn test_single_strip() {
        let view = ViewContext::new(Vec3::new(0.0, -100.0, 0.0), Vec3::Z);
        let mut batch = RibbonBatch::new(false);
        batch.push_ribbon(&[point(0.0), point(1.0), point(2.0)], 1, &view);

        assert_eq!(batch.vertices.len(), 6);
        assert_eq!(batch.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(batch.triangle_count(), 4);
        assert_eq!(batch.degenerate_triangles(), 0);

        let top = batch.vertices.get(0).unwrap();
        let bottom = batch.vertices.get(1).unwrap();
        assert_eq!(top.position, [0.0, 0.0, 2.0]);
        assert_eq!(bottom.position, [0.0, 0.0, -2.0]);
        assert_eq!(top.tex_coord[1], 0.0);
        assert_eq!(bottom.tex_coord[1], 1.0);
    }

    #[test]
    fn test_sheets_joined_by_degenerates() {
        let view = ViewContext::default();
        let mut batch = RibbonBatch::new(false);
        batch.push_ribbon(&[point(0.0), point(1.0)], 2, &view);
        batch.push_ribbon(&[point(5.0), point(6.0), point(7.0)], 1, &view);

        // 2 + 2 + 4 visible, 4 degenerates per join.
        assert_eq!(batch.strip_count(), 3);
        assert_eq!(batch.ribbon_triangles(), 8);
        assert_eq!(batch.degenerate_triangles(), 8);
        assert_eq!(batch.indices.len() as u32, batch.triangle_count() + 2);
        assert_eq!(&batch.indices[4..6], &[3, 4]);
    }

    #[test]
    fn test_pre_view_translation() {
        let view = ViewContext::new(Vec3::new(0.0, -100.0, 0.0), Vec3::Z)
            .with_pre_view_translation(Vec3::new(10.0, 0.0, 0.0));
        let mut batch = RibbonBatch::new(false);
        batch.push_ribbon(&[point(0.0), point(1.0)], 1, &view);
        assert_eq!(batch.vertices.get(0).unwrap().old_position, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tex_u() {
        assert_eq!(tex_u(5.0, 10.0, 2, 0.0), (1.0, 0.5));
        assert_eq!(tex_u(5.0, 10.0, 2, 2.5), (2.0, 0.5));
        assert_eq!(tex_u(0.0, 0.0, 1, 0.0), (0.0, 0.0));
    }
}
