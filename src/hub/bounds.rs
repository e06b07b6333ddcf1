//! Playable area bounds and spawn placement

use rand::Rng;

/// Distance between the clamp bounds and the spawn area edge
pub const SPAWN_INSET: f64 = 5.0;

/// Axis-aligned playable rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// The hub scene: an 800x600 canvas minus a 15 unit avatar margin
pub const PLAYABLE_BOUNDS: WorldBounds = WorldBounds {
    min_x: 15.0,
    max_x: 785.0,
    min_y: 15.0,
    max_y: 585.0,
};

impl WorldBounds {
    /// Clamp a claimed position into bounds.
    ///
    /// Infinite values clamp to the nearest edge. Returns `None` when either
    /// coordinate is NaN, since there is no meaningful edge to clamp it to.
    pub fn clamp(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if x.is_nan() || y.is_nan() {
            return None;
        }
        Some((
            x.clamp(self.min_x, self.max_x),
            y.clamp(self.min_y, self.max_y),
        ))
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Whole-unit spawn point in `[min + inset, max - inset)` on each axis
    pub fn spawn_position<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let x = rng.gen_range((self.min_x + SPAWN_INSET) as i32..(self.max_x - SPAWN_INSET) as i32);
        let y = rng.gen_range((self.min_y + SPAWN_INSET) as i32..(self.max_y - SPAWN_INSET) as i32);
        (x as f64, y as f64)
    }
}
