//! Tessellation statistics.

/// Statistics from one packed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Emitters that produced at least one ribbon.
    pub emitters: u32,
    /// Beams drawn.
    pub beams: u32,
    /// Trail chains drawn.
    pub trails: u32,
    /// Vertices written.
    pub vertices: u32,
    /// Visible triangles.
    pub triangles: u32,
    /// Triangles spent joining strips.
    pub degenerate_triangles: u32,
    /// Vertex bytes staged for upload.
    pub vertex_bytes: usize,
}

impl RenderStats {
    /// Ribbons drawn, beams and trails together.
    #[must_use]
    pub const fn ribbons(&self) -> u32 {
        self.beams + self.trails
    }

    /// Share of strip triangles that are visible.
    #[must_use]
    pub fn efficiency(&self) -> f32 {
        let total = self.triangles + self.degenerate_triangles;
        if total > 0 {
            self.triangles as f32 / total as f32
        } else {
            0.0
        }
    }
}
