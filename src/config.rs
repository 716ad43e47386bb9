use crate::notifications::Permission;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

pub const DEFAULT_TESTNET_ALGOD_URL: &str = "https://testnet-api.algonode.cloud";
pub const DEFAULT_MAINNET_ALGOD_URL: &str = "https://mainnet-api.algonode.cloud";
pub const DEFAULT_LOCAL_ALGOD_URL: &str = "http://localhost:4001";

pub const DEFAULT_BALANCES_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCAL_STATE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Testnet { url: String },
    Mainnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Mainnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NetworkTarget::Testnet { .. } => "testnet",
            NetworkTarget::Mainnet { .. } => "mainnet",
            NetworkTarget::LocalNode { .. } => "local",
        }
    }
}

impl Default for NetworkTarget {
    fn default() -> Self {
        NetworkTarget::Testnet {
            url: DEFAULT_TESTNET_ALGOD_URL.to_string(),
        }
    }
}

/// Identifiers of the deployed game application and its assets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub app_id: u64,
    pub bud_asset_id: u64,
    pub terp_asset_id: u64,
    pub slot_asset_id: u64,
    pub app_address: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        // public testnet deployment
        Self {
            app_id: 753_910_199,
            bud_asset_id: 753_910_204,
            terp_asset_id: 753_910_205,
            slot_asset_id: 753_910_206,
            app_address: "DOZMB24AAMRL4BRVMUNGO3IWV64OMU33UQ7O7D5ISTXIZUSFIXOMXO4TEI"
                .to_string(),
        }
    }
}

impl ContractConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).wrap_err_with(|| {
            format!("failed to read contract file {}", path.display())
        })?;
        serde_json::from_str(&raw).wrap_err_with(|| {
            format!("invalid contract file {}", path.display())
        })
    }

    pub fn with_overrides(mut self, overrides: &ContractOverrides) -> Self {
        if let Some(app_id) = overrides.app_id {
            self.app_id = app_id;
        }
        if let Some(bud) = overrides.bud_asset_id {
            self.bud_asset_id = bud;
        }
        if let Some(terp) = overrides.terp_asset_id {
            self.terp_asset_id = terp;
        }
        if let Some(slot) = overrides.slot_asset_id {
            self.slot_asset_id = slot;
        }
        if let Some(address) = &overrides.app_address {
            self.app_address = address.clone();
        }
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractOverrides {
    pub app_id: Option<u64>,
    pub bud_asset_id: Option<u64>,
    pub terp_asset_id: Option<u64>,
    pub slot_asset_id: Option<u64>,
    pub app_address: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollIntervals {
    pub balances: Duration,
    pub local_state: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            balances: DEFAULT_BALANCES_INTERVAL,
            local_state: DEFAULT_LOCAL_STATE_INTERVAL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub algod_token: Option<String>,
    pub contract: ContractConfig,
    pub account: String,
    pub intervals: PollIntervals,
    pub notifications: Permission,
}

/// Expands a leading `~` in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
