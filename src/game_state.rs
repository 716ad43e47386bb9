use crate::{
    config::ContractConfig,
    ledger::{
        AccountInformation,
        LocalState,
    },
    pods::Pod,
};
use serde::Serialize;

/// Harvests needed to claim one slot token. Mirrors the contract's rule.
pub const HARVESTS_PER_SLOT_TOKEN: u64 = 5;
/// Upper bound on unlockable pod slots.
pub const MAX_POD_SLOTS: u64 = 5;
/// Slots available before the ledger records any.
pub const DEFAULT_POD_SLOTS: u64 = 1;

/// Raw asset holdings of the connected account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalances {
    pub bud: u64,
    pub terp: u64,
    pub slot: u64,
    /// microAlgos
    pub algo: u64,
}

impl TokenBalances {
    pub fn from_account(info: &AccountInformation, contract: &ContractConfig) -> Self {
        Self {
            bud: info.asset_amount(contract.bud_asset_id),
            terp: info.asset_amount(contract.terp_asset_id),
            slot: info.asset_amount(contract.slot_asset_id),
            algo: info.amount,
        }
    }
}

/// Whether a value came from a successful poll or is a stand-in for a failed one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Live,
    #[default]
    Unavailable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub balances: SyncState,
    pub local_state: SyncState,
}

impl Freshness {
    pub const LIVE: Freshness = Freshness {
        balances: SyncState::Live,
        local_state: SyncState::Live,
    };

    pub fn is_live(&self) -> bool {
        *self == Self::LIVE
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub balances: TokenBalances,
    pub pods: Vec<Pod>,
    pub active_pods: u64,
    pub can_mint_more_pods: bool,
    pub max_pods: u64,
    pub pod_slots: u64,
    pub harvest_count: u64,
    pub harvests_for_next_slot: u64,
    pub can_claim_slot_token: bool,
    pub can_unlock_slot: bool,
    pub freshness: Freshness,
}

impl GameState {
    /// Combines one poll's pods and balances into the view-model.
    ///
    /// `local_state` is `None` when the account has not opted into the game or
    /// the state could not be fetched; slot counters then fall back to their
    /// defaults.
    pub fn aggregate(
        pods: Vec<Pod>,
        balances: TokenBalances,
        local_state: Option<&LocalState>,
        freshness: Freshness,
    ) -> Self {
        let harvest_count = local_state
            .map(|state| state.uint("harvest_count"))
            .unwrap_or_default();
        let pod_slots = local_state
            .map(|state| state.uint_or("pod_slots", DEFAULT_POD_SLOTS))
            .unwrap_or(DEFAULT_POD_SLOTS);
        let active_pods = pods.iter().filter(|pod| pod.stage.is_occupied()).count() as u64;

        Self {
            balances,
            pods,
            active_pods,
            can_mint_more_pods: active_pods < pod_slots,
            max_pods: MAX_POD_SLOTS,
            pod_slots,
            harvest_count,
            harvests_for_next_slot: HARVESTS_PER_SLOT_TOKEN.saturating_sub(harvest_count),
            can_claim_slot_token: harvest_count >= HARVESTS_PER_SLOT_TOKEN,
            can_unlock_slot: pod_slots < MAX_POD_SLOTS,
            freshness,
        }
    }
}
