use crate::{
    clock::secs_to_millis,
    cooldown::{
        NUTRIENT_COOLDOWN_SECS,
        WATER_COOLDOWN_SECS,
        compute_cooldown,
    },
    ledger::LocalState,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    borrow::Cow,
    fmt,
};

/// Waterings after which the ledger moves a pod to harvest-ready.
pub const WATERS_TO_HARVEST: u64 = 10;
/// Nutrient applications that earn the nutrient yield bonus.
pub const NUTRIENTS_FOR_BONUS: u64 = 10;
/// Harvest yield before bonuses, in raw $BUD units (6 decimals).
pub const BASE_YIELD: u64 = 250_000_000;
const WATER_BONUS_PERCENT: u64 = 20;
const NUTRIENT_BONUS_PERCENT: u64 = 30;

const SLOT_IDS: [u8; 2] = [1, 2];

/// Raw growth phase as stored on the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodStage(u64);

impl PodStage {
    pub const EMPTY: PodStage = PodStage(0);
    pub const NEEDS_CLEANUP: PodStage = PodStage(6);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Growing pods (stages 1 through 4) are the only ones that accept water
    /// or nutrients.
    pub const fn is_actionable(self) -> bool {
        self.0 >= 1 && self.0 <= 4
    }

    pub const fn is_occupied(self) -> bool {
        self.0 > 0
    }

    pub fn status(self) -> PodStatus {
        match self.0 {
            0 => PodStatus::Empty,
            1 => PodStatus::Seedling,
            2 => PodStatus::Vegetative,
            3 => PodStatus::Flowering,
            4 => PodStatus::Mature,
            5 => PodStatus::HarvestReady,
            6 => PodStatus::NeedsCleanup,
            _ => PodStatus::Empty,
        }
    }
}

impl fmt::Display for PodStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    Empty,
    Seedling,
    Vegetative,
    Flowering,
    Mature,
    HarvestReady,
    /// Never derived from ledger state: the contract has no death mechanic.
    Dead,
    NeedsCleanup,
}

impl PodStatus {
    pub fn label(self) -> &'static str {
        match self {
            PodStatus::Empty => "Empty",
            PodStatus::Seedling => "Seedling",
            PodStatus::Vegetative => "Vegetative",
            PodStatus::Flowering => "Flowering",
            PodStatus::Mature => "Mature",
            PodStatus::HarvestReady => "Harvest Ready",
            PodStatus::Dead => "Dead",
            PodStatus::NeedsCleanup => "Needs Cleanup",
        }
    }
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: u8,
    pub name: String,
    pub stage: PodStage,
    pub status: PodStatus,
    pub water_count: u64,
    pub nutrient_count: u64,
    /// milliseconds since epoch, 0 if never watered
    pub last_watered: u64,
    /// milliseconds since epoch, 0 if never fed
    pub last_nutrients: u64,
    pub health: u8,
    pub dna: String,
    pub terpene_profile: String,
    pub pests: bool,
    pub can_water: bool,
    pub can_add_nutrients: bool,
    /// seconds
    pub water_cooldown_remaining: u64,
    /// seconds
    pub nutrient_cooldown_remaining: u64,
}

impl Pod {
    pub fn waters_until_harvest(&self) -> u64 {
        if self.stage.is_actionable() {
            WATERS_TO_HARVEST.saturating_sub(self.water_count)
        } else {
            0
        }
    }

    /// $BUD the pod would yield if harvested with its current counters.
    pub fn projected_yield(&self) -> u64 {
        let mut total = BASE_YIELD;
        if self.water_count >= WATERS_TO_HARVEST {
            total += BASE_YIELD * WATER_BONUS_PERCENT / 100;
        }
        if self.nutrient_count >= NUTRIENTS_FOR_BONUS {
            total += BASE_YIELD * NUTRIENT_BONUS_PERCENT / 100;
        }
        total
    }
}

/// Ledger key for `base` in pod slot `id`: slot 1 is unsuffixed, later slots
/// carry a `_{id}` suffix.
fn slot_key(base: &str, id: u8) -> Cow<'_, str> {
    if id == 1 {
        Cow::Borrowed(base)
    } else {
        Cow::Owned(format!("{base}_{id}"))
    }
}

fn decode_slot(state: &LocalState, id: u8, now_secs: u64) -> Pod {
    let num = |base: &str| state.uint(&slot_key(base, id));
    let text = |base: &str| state.text(&slot_key(base, id));

    let stage = PodStage::new(num("stage"));
    let last_watered = num("last_watered");
    let last_nutrients = num("last_nutrients");
    let water = compute_cooldown(last_watered, WATER_COOLDOWN_SECS, now_secs);
    let nutrients = compute_cooldown(last_nutrients, NUTRIENT_COOLDOWN_SECS, now_secs);

    Pod {
        id,
        name: format!("GrowPod #{id:03}"),
        stage,
        status: stage.status(),
        water_count: num("water_count"),
        nutrient_count: num("nutrient_count"),
        last_watered: secs_to_millis(last_watered),
        last_nutrients: secs_to_millis(last_nutrients),
        health: if stage == PodStage::NEEDS_CLEANUP { 0 } else { 100 },
        dna: text("dna"),
        terpene_profile: text("terpene_profile"),
        pests: false,
        can_water: water.gated(stage),
        can_add_nutrients: nutrients.gated(stage),
        water_cooldown_remaining: water.remaining_secs,
        nutrient_cooldown_remaining: nutrients.remaining_secs,
    }
}

/// Decodes the pods held in an account's application state.
///
/// Slot 1 is always present, an empty slot being a displayable state of its
/// own. Slot 2 only appears once something has been planted in it.
pub fn decode_pods(state: &LocalState, now_secs: u64) -> Vec<Pod> {
    SLOT_IDS
        .iter()
        .map(|&id| decode_slot(state, id, now_secs))
        .filter(|pod| pod.id == 1 || pod.stage.is_occupied())
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn status__every_stage__maps_to_its_status() {
        let expected = [
            PodStatus::Empty,
            PodStatus::Seedling,
            PodStatus::Vegetative,
            PodStatus::Flowering,
            PodStatus::Mature,
            PodStatus::HarvestReady,
            PodStatus::NeedsCleanup,
        ];
        for (raw, status) in expected.into_iter().enumerate() {
            assert_eq!(PodStage::new(raw as u64).status(), status);
        }
    }

    #[test]
    fn status__out_of_range_stage__is_empty() {
        assert_eq!(PodStage::new(7).status(), PodStatus::Empty);
        assert_eq!(PodStage::new(99).status(), PodStatus::Empty);
        assert_eq!(PodStage::new(u64::MAX).status(), PodStatus::Empty);
    }

    #[test]
    fn decode_pods__only_pod_one_keys__yields_single_pod() {
        // given
        let state = LocalState::new()
            .with_uint("stage", 3)
            .with_uint("water_count", 7);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].id, 1);
        assert_eq!(pods[0].stage, PodStage::new(3));
        assert_eq!(pods[0].water_count, 7);
        assert_eq!(pods[0].status, PodStatus::Flowering);
    }

    #[test]
    fn decode_pods__pod_two_stage_zero__is_suppressed() {
        // given
        let state = LocalState::new()
            .with_uint("stage", 2)
            .with_uint("stage_2", 0);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].id, 1);
    }

    #[test]
    fn decode_pods__empty_state__yields_empty_pod_one() {
        // when
        let pods = decode_pods(&LocalState::new(), NOW);

        // then
        assert_eq!(pods.len(), 1);
        let pod = &pods[0];
        assert_eq!(pod.status, PodStatus::Empty);
        assert_eq!(pod.name, "GrowPod #001");
        assert_eq!(pod.dna, "");
        assert!(!pod.can_water);
        assert!(!pod.can_add_nutrients);
        assert_eq!(pod.water_cooldown_remaining, 0);
    }

    #[test]
    fn decode_pods__pod_two_planted__reads_suffixed_keys() {
        // given
        let state = LocalState::new()
            .with_uint("stage", 0)
            .with_uint("stage_2", 4)
            .with_uint("water_count_2", 9)
            .with_uint("nutrient_count_2", 2)
            .with_uint("last_watered_2", NOW - 100)
            .with_text("dna_2", "cafe")
            .with_text("terpene_profile_2", "citrus")
            .with_uint("water_count", 55);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods.len(), 2);
        let pod = &pods[1];
        assert_eq!(pod.id, 2);
        assert_eq!(pod.name, "GrowPod #002");
        assert_eq!(pod.status, PodStatus::Mature);
        assert_eq!(pod.water_count, 9);
        assert_eq!(pod.nutrient_count, 2);
        assert_eq!(pod.dna, "cafe");
        assert_eq!(pod.terpene_profile, "citrus");
        assert_eq!(pod.last_watered, (NOW - 100) * 1000);
        assert!(!pod.can_water);
        assert_eq!(pod.water_cooldown_remaining, WATER_COOLDOWN_SECS - 100);
        assert!(pod.can_add_nutrients);
        assert_eq!(pod.nutrient_cooldown_remaining, 0);
    }

    #[test]
    fn decode_pods__needs_cleanup__has_zero_health_and_no_actions() {
        // given
        let state = LocalState::new().with_uint("stage", 6);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods[0].status, PodStatus::NeedsCleanup);
        assert_eq!(pods[0].health, 0);
        assert!(!pods[0].can_water);
        assert!(!pods[0].can_add_nutrients);
    }

    #[test]
    fn decode_pods__timestamps__are_converted_to_millis() {
        // given
        let state = LocalState::new()
            .with_uint("stage", 1)
            .with_uint("last_watered", 1_000)
            .with_uint("last_nutrients", 2_000);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods[0].last_watered, 1_000_000);
        assert_eq!(pods[0].last_nutrients, 2_000_000);
    }

    #[test]
    fn decode_pods__mistyped_values__degrade_to_zero() {
        // given
        let state = LocalState::new()
            .with_text("stage", "three")
            .with_uint("dna", 5);

        // when
        let pods = decode_pods(&state, NOW);

        // then
        assert_eq!(pods[0].stage, PodStage::EMPTY);
        assert_eq!(pods[0].dna, "");
    }

    #[test]
    fn waters_until_harvest__growing_pod__counts_down_to_ten() {
        // given
        let state = LocalState::new()
            .with_uint("stage", 3)
            .with_uint("water_count", 6);

        // when
        let pod = decode_pods(&state, NOW).remove(0);

        // then
        assert_eq!(pod.waters_until_harvest(), 4);
    }

    #[test]
    fn projected_yield__bonuses__stack_on_base_yield() {
        // given
        let base = decode_pods(&LocalState::new().with_uint("stage", 5), NOW).remove(0);
        let watered = decode_pods(
            &LocalState::new()
                .with_uint("stage", 5)
                .with_uint("water_count", 10),
            NOW,
        )
        .remove(0);
        let both = decode_pods(
            &LocalState::new()
                .with_uint("stage", 5)
                .with_uint("water_count", 12)
                .with_uint("nutrient_count", 10),
            NOW,
        )
        .remove(0);

        // then
        assert_eq!(base.projected_yield(), 250_000_000);
        assert_eq!(watered.projected_yield(), 300_000_000);
        assert_eq!(both.projected_yield(), 375_000_000);
    }

    prop_compose! {
        fn arb_state()(
            stage in 0u64..9,
            stage_2 in 0u64..9,
            last_watered in prop_oneof![Just(0u64), (NOW - 2_000)..=NOW],
            last_nutrients in prop_oneof![Just(0u64), (NOW - 2_000)..=NOW],
            last_watered_2 in prop_oneof![Just(0u64), (NOW - 2_000)..=NOW],
        ) -> LocalState {
            LocalState::new()
                .with_uint("stage", stage)
                .with_uint("stage_2", stage_2)
                .with_uint("last_watered", last_watered)
                .with_uint("last_nutrients", last_nutrients)
                .with_uint("last_watered_2", last_watered_2)
        }
    }

    proptest! {
        #[test]
        fn decode_pods__action_flags__imply_ready_and_growing(state in arb_state()) {
            for pod in decode_pods(&state, NOW) {
                if pod.can_water {
                    prop_assert_eq!(pod.water_cooldown_remaining, 0);
                    prop_assert!(pod.stage.is_actionable());
                }
                if pod.can_add_nutrients {
                    prop_assert_eq!(pod.nutrient_cooldown_remaining, 0);
                    prop_assert!(pod.stage.is_actionable());
                }
                if pod.stage.is_actionable() && pod.water_cooldown_remaining == 0 {
                    prop_assert!(pod.can_water);
                }
            }
        }

        #[test]
        fn decode_pods__pod_two__present_iff_planted(state in arb_state()) {
            let pods = decode_pods(&state, NOW);
            prop_assert_eq!(pods[0].id, 1);
            prop_assert_eq!(pods.len() == 2, state.uint("stage_2") > 0);
        }
    }
}
