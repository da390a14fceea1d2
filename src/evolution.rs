//! Evolution stage detection.
//!
//! A pet's stage is a pure function of its level. A transition is reported
//! only when the level goes **up** and crosses a stage boundary; level drops
//! are never celebrated (and never reported as a devolution either).

use crate::model::{EvolutionEvent, EvolutionStage, PetStats};

/// Minimum level for the juvenile stage.
pub const JUVENILE_LEVEL: u32 = 4;
/// Minimum level for the adult stage.
pub const ADULT_LEVEL: u32 = 7;
/// Minimum level for the legendary stage.
pub const LEGENDARY_LEVEL: u32 = 12;

/// Map a level to its stage.
pub fn stage_for_level(level: u32) -> EvolutionStage {
    if level >= LEGENDARY_LEVEL {
        EvolutionStage::Legendary
    } else if level >= ADULT_LEVEL {
        EvolutionStage::Adult
    } else if level >= JUVENILE_LEVEL {
        EvolutionStage::Juvenile
    } else {
        EvolutionStage::Egg
    }
}

/// Compare two snapshots and report a stage transition, if any.
pub fn detect_evolution(old: Option<&PetStats>, new: Option<&PetStats>) -> Option<EvolutionEvent> {
    let (old, new) = (old?, new?);
    let (old_level, new_level) = (old.level.max(1), new.level.max(1));

    if new_level <= old_level {
        return None;
    }

    let old_stage = stage_for_level(old_level);
    let new_stage = stage_for_level(new_level);

    (old_stage != new_stage).then_some(EvolutionEvent {
        old_stage,
        new_stage,
        level: new_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPetStats;

    fn at_level(level: u32) -> PetStats {
        RawPetStats {
            level: Some(level),
            ..Default::default()
        }
        .normalize()
    }

    #[test]
    fn test_stage_thresholds() {
        assert_eq!(stage_for_level(1), EvolutionStage::Egg);
        assert_eq!(stage_for_level(3), EvolutionStage::Egg);
        assert_eq!(stage_for_level(4), EvolutionStage::Juvenile);
        assert_eq!(stage_for_level(6), EvolutionStage::Juvenile);
        assert_eq!(stage_for_level(7), EvolutionStage::Adult);
        assert_eq!(stage_for_level(11), EvolutionStage::Adult);
        assert_eq!(stage_for_level(12), EvolutionStage::Legendary);
        assert_eq!(stage_for_level(500), EvolutionStage::Legendary);
    }

    #[test]
    fn test_stage_is_monotonic() {
        let mut previous = stage_for_level(0);
        for level in 0..=40 {
            let stage = stage_for_level(level);
            assert!(stage >= previous, "stage regressed at level {level}");
            previous = stage;
        }
    }

    #[test]
    fn test_egg_to_juvenile() {
        let event = detect_evolution(Some(&at_level(3)), Some(&at_level(4)));
        assert_eq!(
            event,
            Some(EvolutionEvent {
                old_stage: EvolutionStage::Egg,
                new_stage: EvolutionStage::Juvenile,
                level: 4,
            })
        );
    }

    #[test]
    fn test_same_stage_no_event() {
        assert!(detect_evolution(Some(&at_level(5)), Some(&at_level(6))).is_none());
    }

    #[test]
    fn test_level_decrease_no_event() {
        assert!(detect_evolution(Some(&at_level(8)), Some(&at_level(5))).is_none());
    }

    #[test]
    fn test_skipping_stages_reports_final_stage() {
        let event = detect_evolution(Some(&at_level(2)), Some(&at_level(13))).unwrap();
        assert_eq!(event.old_stage, EvolutionStage::Egg);
        assert_eq!(event.new_stage, EvolutionStage::Legendary);
        assert_eq!(event.level, 13);
    }

    #[test]
    fn test_missing_side_no_event() {
        assert!(detect_evolution(None, Some(&at_level(4))).is_none());
        assert!(detect_evolution(Some(&at_level(3)), None).is_none());
    }
}
