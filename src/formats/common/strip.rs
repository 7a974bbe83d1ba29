//! Triangle-strip index reconstruction.
//!
//! Both titles store geometry as flattened triangle strips: a linear vertex
//! list where each unflagged vertex closes a triangle with its two
//! predecessors, alternating winding so that face orientation stays
//! consistent. The two-state winding machine lives here so the per-title
//! readers only decide, per vertex, whether to emit, skip, or reset.

/// Winding state for rebuilding triangle indices from a strip.
#[derive(Debug, Default)]
pub struct StripWinding {
    reverse: bool,
}

impl StripWinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next emitted triangle uses reversed vertex order.
    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    /// Start a new strip: the winding returns to normal order.
    pub fn reset(&mut self) {
        self.reverse = false;
    }

    /// Emit the triangle closed by vertex `i` and flip the winding.
    ///
    /// The first two vertices of a buffer have no two predecessors; the
    /// triangles they would form are dropped rather than emitted with
    /// out-of-range indices.
    pub fn emit(&mut self, i: usize, indices: &mut Vec<u32>) {
        if i >= 2 {
            if self.reverse {
                indices.extend_from_slice(&[i as u32, i as u32 - 1, i as u32 - 2]);
            } else {
                indices.extend_from_slice(&[i as u32 - 2, i as u32 - 1, i as u32]);
            }
        }
        self.reverse = !self.reverse;
    }

    /// Advance past vertex `i` without emitting, still flipping the winding.
    pub fn skip(&mut self) {
        self.reverse = !self.reverse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_vertex_strip_yields_two_triangles() {
        let mut winding = StripWinding::new();
        let mut indices = Vec::new();
        for i in 0..4 {
            winding.emit(i, &mut indices);
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn index_count_law_holds_without_resets() {
        for n in 3..16 {
            let mut winding = StripWinding::new();
            let mut indices = Vec::new();
            for i in 0..n {
                winding.emit(i, &mut indices);
            }
            assert_eq!(indices.len(), 3 * (n - 2));
        }
    }

    #[test]
    fn reset_restores_normal_order() {
        let mut winding = StripWinding::new();
        let mut indices = Vec::new();
        winding.emit(0, &mut indices);
        assert!(winding.is_reversed());
        winding.reset();
        assert!(!winding.is_reversed());
        assert!(indices.is_empty());
    }

    #[test]
    fn skip_flips_winding_without_emitting() {
        let mut winding = StripWinding::new();
        let mut indices = Vec::new();
        winding.skip();
        winding.skip();
        winding.emit(2, &mut indices);
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
