use crate::pods::PodStage;

/// Seconds between two waterings of the same pod.
pub const WATER_COOLDOWN_SECS: u64 = 600;
/// Seconds between two nutrient applications on the same pod.
pub const NUTRIENT_COOLDOWN_SECS: u64 = 600;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cooldown {
    pub can_act: bool,
    pub remaining_secs: u64,
}

impl Cooldown {
    pub const READY: Cooldown = Cooldown {
        can_act: true,
        remaining_secs: 0,
    };

    /// Whether the action is allowed once the pod's growth stage is taken into
    /// account. Only growing pods (stages 1 through 4) accept water or nutrients.
    pub fn gated(&self, stage: PodStage) -> bool {
        self.can_act && stage.is_actionable()
    }
}

/// Cooldown state for an action last performed at `last_action_secs`.
///
/// A `last_action_secs` of zero means the action was never performed, which is
/// always allowed. A clock lagging behind the ledger counts as zero elapsed time.
pub fn compute_cooldown(
    last_action_secs: u64,
    duration_secs: u64,
    now_secs: u64,
) -> Cooldown {
    if last_action_secs == 0 {
        return Cooldown::READY;
    }
    let elapsed = now_secs.saturating_sub(last_action_secs);
    Cooldown {
        can_act: elapsed >= duration_secs,
        remaining_secs: duration_secs.saturating_sub(elapsed),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compute_cooldown__never_acted__is_ready() {
        // when
        let cooldown = compute_cooldown(0, 600, 123_456);

        // then
        assert_eq!(cooldown, Cooldown::READY);
    }

    #[test]
    fn compute_cooldown__zero_elapsed__full_duration_remains() {
        // when
        let cooldown = compute_cooldown(1000, 600, 1000);

        // then
        assert_eq!(
            cooldown,
            Cooldown {
                can_act: false,
                remaining_secs: 600
            }
        );
    }

    #[test]
    fn compute_cooldown__elapsed_equals_duration__can_act() {
        // when
        let cooldown = compute_cooldown(1000, 600, 1600);

        // then
        assert_eq!(cooldown, Cooldown::READY);
    }

    #[test]
    fn compute_cooldown__long_after_duration__can_act() {
        // when
        let cooldown = compute_cooldown(1000, 600, 1700);

        // then
        assert_eq!(cooldown, Cooldown::READY);
    }

    #[test]
    fn compute_cooldown__partially_elapsed__reports_remaining() {
        // when
        let cooldown = compute_cooldown(1000, 600, 1250);

        // then
        assert_eq!(
            cooldown,
            Cooldown {
                can_act: false,
                remaining_secs: 350
            }
        );
    }

    #[test]
    fn compute_cooldown__clock_behind_ledger__treated_as_zero_elapsed() {
        // when
        let cooldown = compute_cooldown(2000, 600, 1990);

        // then
        assert_eq!(
            cooldown,
            Cooldown {
                can_act: false,
                remaining_secs: 600
            }
        );
    }

    #[test]
    fn gated__ready_cooldown_outside_growing_stages__is_false() {
        for stage in [0, 5, 6, 7, 99] {
            assert!(!Cooldown::READY.gated(PodStage::new(stage)), "stage {stage}");
        }
        for stage in 1..=4 {
            assert!(Cooldown::READY.gated(PodStage::new(stage)), "stage {stage}");
        }
    }

    proptest! {
        #[test]
        fn compute_cooldown__can_act_iff_nothing_remains(
            last in 0u64..10_000,
            duration in 0u64..5_000,
            now in 0u64..20_000,
        ) {
            let cooldown = compute_cooldown(last, duration, now);
            prop_assert_eq!(cooldown.can_act, cooldown.remaining_secs == 0);
            prop_assert!(cooldown.remaining_secs <= duration);
        }
    }
}
