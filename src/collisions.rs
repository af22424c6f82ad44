//! Touch detection and inelastic merging.
//!
//! Only pairs involving a member of the influencer subset are checked, the
//! same restriction the force model uses.

use crate::body::Body;
use crate::forces::InfluencerSet;
use crate::trail::TrailGrid;
use gravity_common::{MergeCategory, MergePolicy};
use log::warn;

/// One resolved merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeEvent {
    pub survivor: usize,
    pub loser: usize,
    pub category: MergeCategory,
}

/// Merge parameters that stay fixed between ticks.
#[derive(Debug, Clone, Copy)]
pub struct MergeRules {
    pub policy: MergePolicy,
    pub density: f64,
    /// The last-indexed sun; merges it takes part in are tagged `SunMerge`.
    pub primary_sun: usize,
}

/// Heavier body survives; on equal mass the first operand does.
fn order_by_mass(bodies: &[Body], a: usize, b: usize) -> (usize, usize) {
    if bodies[a].mass() < bodies[b].mass() {
        (b, a)
    } else {
        (a, b)
    }
}

/// Folds `loser` into `survivor`, conserving mass and momentum.
///
/// Suns are never moved or reweighed by a merge.
fn absorb(bodies: &mut [Body], survivor: usize, loser: usize, density: f64) {
    if bodies[survivor].is_sun {
        return;
    }
    let loser_mass = bodies[loser].mass();
    let loser_momentum = bodies[loser].momentum();
    let s = &mut bodies[survivor];
    let total = s.mass() + loser_mass;
    s.state.velocity = (s.momentum() + loser_momentum) / total;
    s.set_mass(total, density);
}

/// Detects every touching pair and resolves each one once.
///
/// Losers are marked merged permanently and their seed cell (if any) is stamped
/// into `trail` with `tick`.
pub fn resolve_collisions(
    bodies: &mut [Body],
    influencers: &InfluencerSet,
    rules: &MergeRules,
    tick: u64,
    trail: &mut TrailGrid,
) -> Vec<MergeEvent> {
    let mut events = Vec::new();
    for i in 0..bodies.len() {
        if bodies[i].merged {
            continue;
        }
        for &j in influencers.indices() {
            if j == i || j >= bodies.len() || bodies[j].merged {
                continue;
            }
            if !bodies[i].touches(&bodies[j]) {
                continue;
            }
            let (survivor, loser) = order_by_mass(bodies, i, j);
            let category = if survivor == rules.primary_sun || loser == rules.primary_sun {
                MergeCategory::SunMerge
            } else {
                MergeCategory::OtherMerge
            };

            let lost = &mut bodies[loser];
            lost.merged = true;
            lost.merge_category = category;
            if let Some(cell) = lost.origin_cell {
                if !trail.record(cell, tick, category) {
                    warn!("Body {} has origin cell {:?} outside the trail grid.", loser, cell);
                }
            }

            if rules.policy == MergePolicy::MomentumConserving {
                absorb(bodies, survivor, loser, rules.density);
            }
            events.push(MergeEvent { survivor, loser, category });

            if loser == i {
                break;
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyState, GridCoord};
    use gravity_common::Vec2;

    const DENSITY: f64 = 0.001;

    fn body(x: f64, vx: f64, mass: f64) -> Body {
        Body::with_mass(BodyState::new(Vec2::new(x, 0.0), Vec2::new(vx, 0.0)), mass, DENSITY)
    }

    fn rules(policy: MergePolicy, primary_sun: usize) -> MergeRules {
        MergeRules { policy, density: DENSITY, primary_sun }
    }

    /// Masses 10 and 5, already overlapping.
    fn touching_pair() -> Vec<Body> {
        let mut bodies = vec![body(0.0, 1.0, 10.0), body(1.0, -4.0, 5.0)];
        bodies[1].origin_cell = Some(GridCoord { ix: 1, iy: 0 });
        bodies
    }

    #[test]
    fn momentum_conserving_merge_folds_mass_and_momentum() {
        let mut bodies = touching_pair();
        let p_before = bodies[0].momentum() + bodies[1].momentum();
        let mut trail = TrailGrid::new(2, 1);
        let events = resolve_collisions(
            &mut bodies,
            &InfluencerSet::new(vec![0, 1]),
            &rules(MergePolicy::MomentumConserving, 99),
            7,
            &mut trail,
        );

        assert_eq!(events, vec![MergeEvent { survivor: 0, loser: 1, category: MergeCategory::OtherMerge }]);
        assert!(!bodies[0].merged && bodies[1].merged);
        assert!((bodies[0].mass() - 15.0).abs() < 1e-12);
        let p_after = bodies[0].momentum();
        assert!(p_after.distance(p_before) < 1e-9, "{:?} vs {:?}", p_after, p_before);
        let expected_radius = crate::body::radius_from_mass(15.0, DENSITY);
        assert!((bodies[0].radius() - expected_radius).abs() < 1e-12);

        let cell = trail.cell(GridCoord { ix: 1, iy: 0 }).unwrap();
        assert_eq!(cell.last_merge_tick, 7);
        assert_eq!(cell.category, MergeCategory::OtherMerge);
    }

    #[test]
    fn survivor_unchanged_policy_only_retires_the_loser() {
        let mut bodies = touching_pair();
        let before = bodies[0].clone();
        let mut trail = TrailGrid::new(2, 1);
        let events = resolve_collisions(
            &mut bodies,
            &InfluencerSet::new(vec![0, 1]),
            &rules(MergePolicy::SurvivorUnchanged, 99),
            1,
            &mut trail,
        );
        assert_eq!(events.len(), 1);
        assert!(bodies[1].merged);
        assert_eq!(bodies[0], before);
    }

    #[test]
    fn equal_masses_keep_the_first_operand() {
        let mut bodies = vec![body(0.0, 0.0, 2.0), body(0.5, 0.0, 2.0)];
        let mut trail = TrailGrid::new(1, 1);
        let events = resolve_collisions(
            &mut bodies,
            &InfluencerSet::new(vec![1]),
            &rules(MergePolicy::SurvivorUnchanged, 99),
            1,
            &mut trail,
        );
        assert_eq!(events[0].survivor, 0);
        assert_eq!(events[0].loser, 1);
    }

    #[test]
    fn suns_are_not_moved_by_merges() {
        let mut bodies = vec![body(0.0, 3.0, 1.0), body(0.5, 0.0, 50.0)];
        bodies[1].is_sun = true;
        bodies[0].origin_cell = Some(GridCoord { ix: 0, iy: 0 });
        let sun_before = bodies[1].clone();
        let mut trail = TrailGrid::new(1, 1);
        let events = resolve_collisions(
            &mut bodies,
            &InfluencerSet::new(vec![1]),
            &rules(MergePolicy::MomentumConserving, 1),
            4,
            &mut trail,
        );
        assert_eq!(events[0].category, MergeCategory::SunMerge);
        assert!(bodies[0].merged);
        assert_eq!(bodies[1], sun_before);
        assert_eq!(trail.cell(GridCoord { ix: 0, iy: 0 }).unwrap().category, MergeCategory::SunMerge);
    }

    #[test]
    fn losing_primary_sun_still_tags_a_sun_merge() {
        let heavy_planet_and_sun = || {
            let mut bodies = vec![body(0.0, 0.0, 100.0), body(0.5, 0.0, 50.0)];
            bodies[0].origin_cell = Some(GridCoord { ix: 0, iy: 0 });
            bodies[1].is_sun = true;
            bodies
        };
        let set = InfluencerSet::new(vec![1]);

        let mut bodies = heavy_planet_and_sun();
        let mut trail = TrailGrid::new(1, 1);
        let r = rules(MergePolicy::SurvivorUnchanged, 1);
        let events = resolve_collisions(&mut bodies, &set, &r, 3, &mut trail);
        assert_eq!(events, vec![MergeEvent { survivor: 0, loser: 1, category: MergeCategory::SunMerge }]);
        assert!(bodies[1].merged && !bodies[0].merged);
        // Suns carry no seed cell, so nothing is stamped.
        assert_eq!(trail.recorded_count(), 0);

        // The same merge against the secondary sun is an ordinary one.
        let mut bodies = heavy_planet_and_sun();
        let r = rules(MergePolicy::SurvivorUnchanged, 99);
        let events = resolve_collisions(&mut bodies, &set, &r, 3, &mut trail);
        assert_eq!(events[0].category, MergeCategory::OtherMerge);
    }

    #[test]
    fn each_pair_resolves_once_and_merged_bodies_are_skipped() {
        // Two influencers overlapping each other and a third body.
        let mut bodies = vec![body(0.0, 0.0, 1.0), body(0.2, 0.0, 3.0), body(0.4, 0.0, 2.0)];
        let mut trail = TrailGrid::new(1, 1);
        let set = InfluencerSet::new(vec![1, 2]);
        let r = rules(MergePolicy::SurvivorUnchanged, 2);
        let events = resolve_collisions(&mut bodies, &set, &r, 1, &mut trail);

        // 0 loses to 1, then 1 absorbs 2; 2 is then skipped as an outer body.
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].survivor, events[0].loser), (1, 0));
        assert_eq!((events[1].survivor, events[1].loser), (1, 2));
        assert!(bodies[0].merged && bodies[2].merged && !bodies[1].merged);

        let again = resolve_collisions(&mut bodies, &set, &r, 2, &mut trail);
        assert!(again.is_empty());
        assert!(bodies[0].merged && bodies[2].merged);
    }
}
