//! Stat delta calculation.
//!
//! Compares two consecutive [`PetStats`] snapshots and reports which stats
//! moved, for "+N / -N" feedback. Everything here is pure.

use crate::model::{PetStats, StatDelta, StatKey};

/// Weight of hunger in derived happiness.
const HUNGER_WEIGHT: f64 = 0.25;
/// Weight of hygiene in derived happiness.
const HYGIENE_WEIGHT: f64 = 0.20;
/// Weight of energy in derived happiness.
const ENERGY_WEIGHT: f64 = 0.25;
/// Weight of health in derived happiness.
const HEALTH_WEIGHT: f64 = 0.30;

/// Deltas at or below this magnitude are rounding noise.
const DELTA_THRESHOLD: f64 = 0.5;

/// Round half up, so 55.5 becomes 56 and -0.5 becomes 0.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Happiness derived from the other stats.
///
/// `round(hunger*0.25 + hygiene*0.20 + energy*0.25 + health*0.30)`
///
/// This is always computed from the stats, even when the server supplied its
/// own `happiness`, so two snapshots are compared on the same scale.
pub fn derived_happiness(stats: &PetStats) -> f64 {
    round_half_up(
        stats.hunger * HUNGER_WEIGHT
            + stats.hygiene * HYGIENE_WEIGHT
            + stats.energy * ENERGY_WEIGHT
            + stats.health * HEALTH_WEIGHT,
    )
}

/// Value of a tracked stat, with happiness in its derived form.
pub fn stat_value(stats: &PetStats, key: StatKey) -> f64 {
    match key {
        StatKey::Happiness => derived_happiness(stats),
        StatKey::Hunger => stats.hunger,
        StatKey::Hygiene => stats.hygiene,
        StatKey::Energy => stats.energy,
        StatKey::Health => stats.health,
    }
}

/// Signed per-stat changes from `previous` to `next`, in [`StatKey::ALL`] order.
///
/// Returns nothing when there is no previous snapshot.
pub fn stat_deltas(previous: Option<&PetStats>, next: &PetStats) -> Vec<StatDelta> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    StatKey::ALL
        .iter()
        .filter_map(|&key| {
            let delta = round_half_up(stat_value(next, key) - stat_value(previous, key));
            (delta.abs() > DELTA_THRESHOLD).then_some(StatDelta {
                key,
                delta: delta as i64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPetStats;

    fn stats(hunger: f64, health: f64, energy: f64, hygiene: f64) -> PetStats {
        RawPetStats {
            hunger: Some(hunger),
            health: Some(health),
            energy: Some(energy),
            hygiene: Some(hygiene),
            ..Default::default()
        }
        .normalize()
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(55.5), 56.0);
        assert_eq!(round_half_up(61.75), 62.0);
        assert_eq!(round_half_up(0.3), 0.0);
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(-2.6), -3.0);
    }

    #[test]
    fn test_derived_happiness_formula() {
        // 40*.25 + 50*.20 + 70*.25 + 60*.30 = 55.5
        assert_eq!(derived_happiness(&stats(40.0, 60.0, 70.0, 50.0)), 56.0);
        // 65*.25 + 50*.20 + 70*.25 + 60*.30 = 61.75
        assert_eq!(derived_happiness(&stats(65.0, 60.0, 70.0, 50.0)), 62.0);
    }

    #[test]
    fn test_derived_happiness_hygiene_aliases() {
        let base = RawPetStats {
            hunger: Some(40.0),
            health: Some(60.0),
            energy: Some(70.0),
            ..Default::default()
        };

        let both = RawPetStats {
            hygiene: Some(50.0),
            cleanliness: Some(100.0),
            ..base.clone()
        };
        let cleanliness_only = RawPetStats {
            cleanliness: Some(50.0),
            ..base.clone()
        };
        let neither = base.clone();

        assert_eq!(derived_happiness(&both.normalize()), 56.0);
        assert_eq!(derived_happiness(&cleanliness_only.normalize()), 56.0);
        // 10 + 60*.20 + 17.5 + 18 = 57.5
        assert_eq!(derived_happiness(&neither.normalize()), 58.0);
    }

    #[test]
    fn test_no_previous_means_no_deltas() {
        assert!(stat_deltas(None, &stats(50.0, 50.0, 50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_small_changes_are_suppressed() {
        let previous = stats(50.0, 50.0, 50.0, 50.0);
        let next = stats(50.3, 50.0, 50.0, 50.0);

        assert!(stat_deltas(Some(&previous), &next).is_empty());
    }

    #[test]
    fn test_hunger_delta_emitted() {
        let previous = stats(50.0, 50.0, 50.0, 50.0);
        let next = stats(53.0, 50.0, 50.0, 50.0);

        let deltas = stat_deltas(Some(&previous), &next);
        assert!(deltas.contains(&StatDelta {
            key: StatKey::Hunger,
            delta: 3
        }));
    }

    #[test]
    fn test_full_round_trip_deltas() {
        let previous = stats(40.0, 60.0, 70.0, 50.0);
        let next = stats(65.0, 60.0, 70.0, 50.0);

        let deltas = stat_deltas(Some(&previous), &next);
        assert_eq!(
            deltas,
            vec![
                StatDelta {
                    key: StatKey::Happiness,
                    delta: 6
                },
                StatDelta {
                    key: StatKey::Hunger,
                    delta: 25
                },
            ]
        );
    }

    #[test]
    fn test_negative_deltas() {
        let previous = stats(80.0, 80.0, 80.0, 80.0);
        let next = stats(80.0, 80.0, 60.0, 80.0);

        let deltas = stat_deltas(Some(&previous), &next);
        assert_eq!(
            deltas,
            vec![
                StatDelta {
                    key: StatKey::Happiness,
                    delta: -5
                },
                StatDelta {
                    key: StatKey::Energy,
                    delta: -20
                },
            ]
        );
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let snapshot = stats(12.0, 34.0, 56.0, 78.0);
        assert!(stat_deltas(Some(&snapshot), &snapshot.clone()).is_empty());
    }
}
