//! Classic fourth-order Runge-Kutta for `pos' = vel`, `vel' = accel(pos)`.
//!
//! Every stage evaluates the force against the *unmodified* positions in
//! `bodies`; other bodies are never advanced mid-step.

use crate::body::{Body, BodyState, Derivative};
use crate::forces::{ForceModel, InfluencerSet};

/// Derivative of `state` for body `idx`. `_t` is accepted for symmetry; gravity is time-independent.
pub fn derivative<F: ForceModel + ?Sized>(
    idx: usize,
    mass: f64,
    state: &BodyState,
    bodies: &[Body],
    influencers: &InfluencerSet,
    force: &F,
    _t: f64,
) -> Derivative {
    Derivative {
        velocity: state.velocity,
        acceleration: force.acceleration(idx, mass, state.position, bodies, influencers),
    }
}

/// Advances body `idx` by `dt` and returns its new state without touching `bodies`.
pub fn rk4_step<F: ForceModel + ?Sized>(
    idx: usize,
    bodies: &[Body],
    influencers: &InfluencerSet,
    force: &F,
    t: f64,
    dt: f64,
) -> BodyState {
    let body = &bodies[idx];
    let mass = body.mass();
    let initial = body.state;
    let half_dt = 0.5 * dt;

    let a = derivative(idx, mass, &initial, bodies, influencers, force, t);
    let b = derivative(idx, mass, &initial.advanced(&a, half_dt), bodies, influencers, force, t + half_dt);
    let c = derivative(idx, mass, &initial.advanced(&b, half_dt), bodies, influencers, force, t + half_dt);
    let d = derivative(idx, mass, &initial.advanced(&c, dt), bodies, influencers, force, t + dt);

    let combined = Derivative {
        velocity: (a.velocity + (b.velocity + c.velocity) * 2.0 + d.velocity) * (1.0 / 6.0),
        acceleration: (a.acceleration + (b.acceleration + c.acceleration) * 2.0 + d.acceleration)
            * (1.0 / 6.0),
    };
    initial.advanced(&combined, dt)
}
