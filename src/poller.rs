use crate::{
    config::{
        ContractConfig,
        PollIntervals,
    },
    game_state::{
        SyncState,
        TokenBalances,
    },
    ledger::{
        LedgerSource,
        LocalState,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    Balances {
        balances: TokenBalances,
        sync: SyncState,
    },
    LocalState {
        /// `None` when the account has not opted into the game
        state: Option<LocalState>,
        sync: SyncState,
    },
}

#[derive(Debug)]
pub enum PollCommand {
    FetchNow,
    Shutdown,
}

/// Everything a poll needs to reach the ledger.
pub struct PollTarget<L> {
    pub ledger: Arc<L>,
    pub account: String,
    pub contract: ContractConfig,
}

impl<L> Clone for PollTarget<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            account: self.account.clone(),
            contract: self.contract.clone(),
        }
    }
}

impl<L: LedgerSource> PollTarget<L> {
    pub async fn fetch_balances(&self) -> Result<TokenBalances> {
        let info = self
            .ledger
            .account_information(&self.account)
            .await
            .wrap_err("fetching balances failed")?;
        Ok(TokenBalances::from_account(&info, &self.contract))
    }

    pub async fn fetch_local_state(&self) -> Result<Option<LocalState>> {
        let info = self
            .ledger
            .account_information(&self.account)
            .await
            .wrap_err("fetching local state failed")?;
        Ok(info.local_state_for(self.contract.app_id).cloned())
    }

    /// Fetches balances, degrading to zero balances on failure.
    pub async fn poll_balances(&self) -> PollEvent {
        match self.fetch_balances().await {
            Ok(balances) => PollEvent::Balances {
                balances,
                sync: SyncState::Live,
            },
            Err(err) => {
                warn!(?err, account = %self.account, "balance poll failed");
                PollEvent::Balances {
                    balances: TokenBalances::default(),
                    sync: SyncState::Unavailable,
                }
            }
        }
    }

    /// Fetches the game's local state, degrading to no state on failure.
    pub async fn poll_local_state(&self) -> PollEvent {
        match self.fetch_local_state().await {
            Ok(state) => PollEvent::LocalState {
                state,
                sync: SyncState::Live,
            },
            Err(err) => {
                warn!(?err, account = %self.account, "local state poll failed");
                PollEvent::LocalState {
                    state: None,
                    sync: SyncState::Unavailable,
                }
            }
        }
    }
}

/// Polls balances and local state on independent intervals.
///
/// Each fetch runs as its own task so a slow request never delays the next
/// tick; results are forwarded in completion order. Stops on
/// [`PollCommand::Shutdown`], when the command sender is dropped, or when the
/// event receiver goes away. In-flight fetches are aborted on exit.
pub async fn poll_worker<L: LedgerSource>(
    target: PollTarget<L>,
    intervals: PollIntervals,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    event_tx: mpsc::UnboundedSender<PollEvent>,
) {
    let mut balances_ticker = time::interval(intervals.balances);
    balances_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut state_ticker = time::interval(intervals.local_state);
    state_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: JoinSet<PollEvent> = JoinSet::new();

    let spawn_balances = |in_flight: &mut JoinSet<PollEvent>| {
        let target = target.clone();
        in_flight.spawn(async move { target.poll_balances().await });
    };
    let spawn_state = |in_flight: &mut JoinSet<PollEvent>| {
        let target = target.clone();
        in_flight.spawn(async move { target.poll_local_state().await });
    };

    loop {
        tokio::select! {
            _ = balances_ticker.tick() => spawn_balances(&mut in_flight),
            _ = state_ticker.tick() => spawn_state(&mut in_flight),
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            debug!("poll event receiver dropped");
                            break;
                        }
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => warn!(?err, "poll task panicked"),
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollCommand::FetchNow) => {
                        spawn_balances(&mut in_flight);
                        spawn_state(&mut in_flight);
                    }
                    Some(PollCommand::Shutdown) | None => break,
                }
            }
        }
    }
    in_flight.shutdown().await;
    debug!("poll worker stopped");
}
