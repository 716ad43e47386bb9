use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    future::Future,
};
use tracing::warn;

const API_TOKEN_HEADER: &str = "X-Algo-API-Token";
const TEAL_BYTES_TYPE: u8 = 1;
const TEAL_UINT_TYPE: u8 = 2;

/// A single application state value, tagged the way the ledger tags it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TealValue {
    Uint(u64),
    Bytes(String),
}

/// Per-account key/value state of one application.
///
/// Lookups are tolerant: a missing key, or a key holding the other value type,
/// reads as that type's zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    entries: BTreeMap<String, TealValue>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uint(mut self, key: impl Into<String>, value: u64) -> Self {
        self.insert(key, TealValue::Uint(value));
        self
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, TealValue::Bytes(value.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: TealValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&TealValue> {
        self.entries.get(key)
    }

    pub fn uint(&self, key: &str) -> u64 {
        match self.entries.get(key) {
            Some(TealValue::Uint(value)) => *value,
            _ => 0,
        }
    }

    pub fn uint_or(&self, key: &str, default: u64) -> u64 {
        match self.entries.get(key) {
            Some(TealValue::Uint(value)) => *value,
            _ => default,
        }
    }

    pub fn text(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(TealValue::Bytes(value)) => value.clone(),
            _ => String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInformation {
    /// microAlgos held by the account
    pub amount: u64,
    /// asset id -> raw holding
    pub assets: BTreeMap<u64, u64>,
    /// application id -> local state of the account in that application
    pub apps_local_state: BTreeMap<u64, LocalState>,
}

impl AccountInformation {
    pub fn asset_amount(&self, asset_id: u64) -> u64 {
        self.assets.get(&asset_id).copied().unwrap_or_default()
    }

    /// `None` when the account has not opted into the application.
    pub fn local_state_for(&self, app_id: u64) -> Option<&LocalState> {
        self.apps_local_state.get(&app_id)
    }
}

pub trait LedgerSource: Send + Sync + 'static {
    fn account_information(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<AccountInformation>> + Send;
}

/// Reads account state from an algod node's REST API.
#[derive(Clone)]
pub struct AlgodClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl AlgodClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for algod")?;
        let token = token.filter(|t| !t.is_empty());
        Ok(Self {
            base_url,
            token,
            http,
        })
    }
}

impl LedgerSource for AlgodClient {
    async fn account_information(&self, address: &str) -> Result<AccountInformation> {
        let url = format!("{}/v2/accounts/{}", self.base_url, address);
        let mut request = self.http.get(url).query(&[("format", "json")]);
        if let Some(token) = &self.token {
            request = request.header(API_TOKEN_HEADER, token);
        }
        let res = request.send().await.wrap_err("algod request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read algod response body")?;
        if status == StatusCode::NOT_FOUND {
            return Err(eyre!("account {address} not found on ledger"));
        }
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!(
                "algod responded with {status} when fetching account {address}: {body}"
            ));
        }
        let dto: AccountDto =
            serde_json::from_slice(&bytes).wrap_err("invalid algod account payload")?;
        Ok(dto.into())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AccountDto {
    #[serde(default)]
    amount: u64,
    #[serde(default)]
    assets: Vec<AssetHoldingDto>,
    #[serde(default)]
    apps_local_state: Vec<AppLocalStateDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AssetHoldingDto {
    asset_id: u64,
    #[serde(default)]
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AppLocalStateDto {
    id: u64,
    #[serde(default)]
    key_value: Vec<KeyValueDto>,
}

#[derive(Deserialize)]
struct KeyValueDto {
    key: String,
    value: TealValueDto,
}

#[derive(Deserialize)]
struct TealValueDto {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    bytes: String,
    #[serde(default)]
    uint: u64,
}

impl From<AccountDto> for AccountInformation {
    /// Undecodable keys or values are skipped so one bad entry never hides
    /// the rest of the account.
    fn from(dto: AccountDto) -> Self {
        let assets = dto
            .assets
            .into_iter()
            .map(|holding| (holding.asset_id, holding.amount))
            .collect();
        let mut apps_local_state = BTreeMap::new();
        for app in dto.apps_local_state {
            let mut state = LocalState::new();
            for kv in app.key_value {
                let key = match decode_base64_text(&kv.key) {
                    Ok(key) => key,
                    Err(err) => {
                        warn!(?err, app_id = app.id, raw = %kv.key, "skipping undecodable state key");
                        continue;
                    }
                };
                let value = match kv.value.kind {
                    TEAL_UINT_TYPE => TealValue::Uint(kv.value.uint),
                    TEAL_BYTES_TYPE => match decode_base64_text(&kv.value.bytes) {
                        Ok(text) => TealValue::Bytes(text),
                        Err(err) => {
                            warn!(?err, app_id = app.id, %key, "skipping undecodable bytes value");
                            continue;
                        }
                    },
                    other => {
                        warn!(%key, kind = other, "skipping state value of unknown type");
                        continue;
                    }
                };
                state.insert(key, value);
            }
            apps_local_state.insert(app.id, state);
        }
        Self {
            amount: dto.amount,
            assets,
            apps_local_state,
        }
    }
}

fn decode_base64_text(raw: &str) -> Result<String> {
    let bytes = BASE64.decode(raw).wrap_err("invalid base64")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
