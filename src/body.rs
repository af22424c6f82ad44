use gravity_common::{BodySnapshot, MergeCategory, Vec2};
use std::f64::consts::PI;

/// Mass of a sphere of the given radius at constant density.
pub fn mass_from_radius(radius: f64, density: f64) -> f64 {
    density * 4.0 * PI * radius.powi(3) / 3.0
}

/// Inverse of [`mass_from_radius`].
pub fn radius_from_mass(mass: f64, density: f64) -> f64 {
    (3.0 * mass / (density * 4.0 * PI)).cbrt()
}

/// Position and velocity of a body; the part RK4 advances.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl BodyState {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// `self + d * dt`, the trial state of an RK4 stage.
    pub fn advanced(&self, d: &Derivative, dt: f64) -> BodyState {
        BodyState {
            position: self.position + d.velocity * dt,
            velocity: self.velocity + d.acceleration * dt,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Time derivative of a [`BodyState`]: velocity and acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Derivative {
    pub velocity: Vec2,
    pub acceleration: Vec2,
}

/// Integer coordinate of the seed grid cell a body was launched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub ix: u32,
    pub iy: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub state: BodyState,
    mass: f64,
    radius: f64,
    /// Set once when the body loses a merge; never cleared.
    pub merged: bool,
    pub merge_category: MergeCategory,
    pub is_sun: bool,
    pub origin_cell: Option<GridCoord>,
}

impl Body {
    /// A body of the given radius; mass follows from the density.
    pub fn with_radius(state: BodyState, radius: f64, density: f64) -> Self {
        Self {
            state,
            mass: mass_from_radius(radius, density),
            radius,
            merged: false,
            merge_category: MergeCategory::None,
            is_sun: false,
            origin_cell: None,
        }
    }

    /// A body of the given mass; radius follows from the density.
    pub fn with_mass(state: BodyState, mass: f64, density: f64) -> Self {
        Self {
            state,
            mass,
            radius: radius_from_mass(mass, density),
            merged: false,
            merge_category: MergeCategory::None,
            is_sun: false,
            origin_cell: None,
        }
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Changes mass and radius together so the density relation always holds.
    pub fn set_mass(&mut self, mass: f64, density: f64) {
        self.mass = mass;
        self.radius = radius_from_mass(mass, density);
    }

    pub fn position(&self) -> Vec2 {
        self.state.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.state.velocity
    }

    pub fn momentum(&self) -> Vec2 {
        self.state.velocity * self.mass
    }

    pub fn is_active(&self) -> bool {
        !self.merged
    }

    /// Bodies touch when their centres are no further apart than the sum of radii.
    pub fn touches(&self, other: &Body) -> bool {
        self.position().distance(other.position()) <= self.radius + other.radius
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            x: self.state.position.x,
            y: self.state.position.y,
            radius: self.radius,
            merged: self.merged,
            is_sun: self.is_sun,
            category: self.merge_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DENSITY: f64 = 0.001;

    #[test]
    fn radius_and_mass_are_inverse() {
        for radius in [0.5, 1.5, 11.9, 250.0] {
            let mass = mass_from_radius(radius, DENSITY);
            assert!((radius_from_mass(mass, DENSITY) - radius).abs() < 1e-9 * radius);
        }
    }

    #[test]
    fn set_mass_recomputes_radius() {
        let mut body = Body::with_radius(BodyState::default(), 1.5, DENSITY);
        let mass = body.mass();
        body.set_mass(mass * 8.0, DENSITY);
        // Eight times the volume doubles the radius.
        assert!((body.radius() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn touch_is_inclusive() {
        let a = Body::with_radius(BodyState::new(Vec2::new(0.0, 0.0), Vec2::zero()), 1.0, DENSITY);
        let b = Body::with_radius(BodyState::new(Vec2::new(2.0, 0.0), Vec2::zero()), 1.0, DENSITY);
        let c = Body::with_radius(BodyState::new(Vec2::new(2.5, 0.0), Vec2::zero()), 1.0, DENSITY);
        assert!(a.touches(&b));
        assert!(!a.touches(&c));
    }
}
