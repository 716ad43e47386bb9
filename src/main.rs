use clap::{
    ArgGroup,
    Args,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use growpod_client::{
    config::{
        AppConfig,
        ContractConfig,
        ContractOverrides,
        DEFAULT_LOCAL_ALGOD_URL,
        DEFAULT_MAINNET_ALGOD_URL,
        DEFAULT_TESTNET_ALGOD_URL,
        NetworkTarget,
        PollIntervals,
        expand_path,
    },
    controller,
    logging::init_tracing,
    notifications::Permission,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Watch GrowPod pods and get reminded when they need care",
    long_about = None,
    group(
        ArgGroup::new("network")
            .args(["testnet", "mainnet", "local"])
            .multiple(false)
    )
)]
struct Cli {
    #[arg(long)]
    testnet: bool,

    #[arg(long)]
    mainnet: bool,

    #[arg(long)]
    local: bool,

    /// Overrides the algod endpoint of the selected network
    #[arg(long, env = "GROWPOD_ALGOD_URL")]
    algod_url: Option<String>,

    #[arg(long, env = "GROWPOD_ALGOD_TOKEN", hide_env_values = true)]
    algod_token: Option<String>,

    /// JSON file with `app_id`, asset ids and `app_address`
    #[arg(long, env = "GROWPOD_CONTRACT_FILE")]
    contract_file: Option<String>,

    #[arg(long, env = "GROWPOD_APP_ID")]
    app_id: Option<u64>,

    #[arg(long, env = "GROWPOD_BUD_ASSET")]
    bud_asset: Option<u64>,

    #[arg(long, env = "GROWPOD_TERP_ASSET")]
    terp_asset: Option<u64>,

    #[arg(long, env = "GROWPOD_SLOT_ASSET")]
    slot_asset: Option<u64>,

    /// Write logs to a daily rolling file in this directory
    #[arg(long, env = "GROWPOD_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the account and log state changes and reminders until Ctrl-C
    Watch {
        #[command(flatten)]
        account: AccountArg,

        /// Emit care reminders
        #[arg(long)]
        notifications: bool,

        #[arg(long, default_value_t = 10)]
        balances_interval: u64,

        #[arg(long, default_value_t = 5)]
        state_interval: u64,
    },
    /// Print the current game state as JSON
    Status {
        #[command(flatten)]
        account: AccountArg,
    },
}

#[derive(Args, Debug)]
struct AccountArg {
    /// Algorand address of the player
    #[arg(long, env = "GROWPOD_ACCOUNT")]
    account: String,
}

impl Cli {
    fn network(&self) -> NetworkTarget {
        let url = |default: &str| self.algod_url.clone().unwrap_or_else(|| default.to_string());
        if self.mainnet {
            NetworkTarget::Mainnet {
                url: url(DEFAULT_MAINNET_ALGOD_URL),
            }
        } else if self.local {
            NetworkTarget::LocalNode {
                url: url(DEFAULT_LOCAL_ALGOD_URL),
            }
        } else {
            NetworkTarget::Testnet {
                url: url(DEFAULT_TESTNET_ALGOD_URL),
            }
        }
    }

    fn contract(&self) -> Result<ContractConfig> {
        let base = match &self.contract_file {
            Some(raw) => ContractConfig::load(&expand_path(raw))
                .wrap_err("loading --contract-file")?,
            None => ContractConfig::default(),
        };
        Ok(base.with_overrides(&ContractOverrides {
            app_id: self.app_id,
            bud_asset_id: self.bud_asset,
            terp_asset_id: self.terp_asset,
            slot_asset_id: self.slot_asset,
            app_address: None,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_dir = cli.log_dir.as_deref().map(expand_path);
    let _guard = init_tracing(log_dir.as_deref())?;

    let network = cli.network();
    let contract = cli.contract()?;

    match cli.command {
        Command::Watch {
            account,
            notifications,
            balances_interval,
            state_interval,
        } => {
            let config = AppConfig {
                network,
                algod_token: cli.algod_token,
                contract,
                account: account.account,
                intervals: PollIntervals {
                    balances: Duration::from_secs(balances_interval.max(1)),
                    local_state: Duration::from_secs(state_interval.max(1)),
                },
                notifications: if notifications {
                    Permission::Granted
                } else {
                    Permission::Default
                },
            };
            controller::run_watch(config).await
        }
        Command::Status { account } => {
            let config = AppConfig {
                network,
                algod_token: cli.algod_token,
                contract,
                account: account.account,
                intervals: PollIntervals::default(),
                notifications: Permission::Default,
            };
            let game = controller::fetch_once(config).await?;
            let json = serde_json::to_string_pretty(&game)
                .wrap_err("serializing game state failed")?;
            println!("{json}");
            Ok(())
        }
    }
}
