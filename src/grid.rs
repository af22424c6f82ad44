use crate::body::GridCoord;
use gravity_common::{SimulationConfig, Vec2};

/// The seed grid: body `(i, j)` for `i in -MX..=MX`, `j in -MY..=MY` is launched
/// with velocity `(i, j) * spacing` and remembers cell `(i + MX, j + MY)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedGrid {
    pub half_x: u32,
    pub half_y: u32,
    pub spacing: f64,
}

impl SeedGrid {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            half_x: config.seeding.grid_half_x,
            half_y: config.seeding.grid_half_y,
            spacing: config.seeding.velocity_spacing,
        }
    }

    pub fn dims(&self) -> (u32, u32) {
        (2 * self.half_x + 1, 2 * self.half_y + 1)
    }

    pub fn len(&self) -> usize {
        let (w, h) = self.dims();
        w as usize * h as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Launch velocity of the body seeded in `coord`.
    pub fn launch_velocity(&self, coord: GridCoord) -> Vec2 {
        let i = coord.ix as f64 - self.half_x as f64;
        let j = coord.iy as f64 - self.half_y as f64;
        Vec2::new(i * self.spacing, j * self.spacing)
    }

    /// All cells in seeding order: outer loop over x, inner over y.
    pub fn cells(&self) -> impl Iterator<Item = GridCoord> {
        let (w, h) = self.dims();
        (0..w).flat_map(move |ix| (0..h).map(move |iy| GridCoord { ix, iy }))
    }
}
