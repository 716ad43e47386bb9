use crate::{
    clock::{
        Clock,
        SystemClock,
    },
    config::{
        AppConfig,
        PollIntervals,
    },
    format::{
        TOKEN_DECIMALS,
        format_cooldown,
        format_token_amount,
    },
    game_state::{
        Freshness,
        GameState,
        TokenBalances,
    },
    ledger::{
        AlgodClient,
        LedgerSource,
        LocalState,
    },
    notifications::{
        NotificationScheduler,
        Notifier,
        Permission,
        TracingNotifier,
    },
    pods::{
        Pod,
        decode_pods,
    },
    poller::{
        PollCommand,
        PollEvent,
        PollTarget,
        poll_worker,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    future::Future,
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    info,
    warn,
};

/// Latest ledger view of one account plus the notifications derived from it.
pub struct GameController<N: Notifier, C: Clock> {
    clock: C,
    scheduler: NotificationScheduler<N>,
    balances: TokenBalances,
    local_state: Option<LocalState>,
    freshness: Freshness,
    connected: bool,
}

impl<N: Notifier, C: Clock> GameController<N, C> {
    pub fn new(notifier: Arc<N>, clock: C) -> Self {
        Self {
            clock,
            scheduler: NotificationScheduler::new(notifier),
            balances: TokenBalances::default(),
            local_state: None,
            freshness: Freshness::default(),
            connected: true,
        }
    }

    pub fn scheduler(&self) -> &NotificationScheduler<N> {
        &self.scheduler
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Ingests one poll result. Returns whether anything observable changed.
    ///
    /// Notifications are rebuilt only when the local state content differs
    /// from the previous poll.
    pub fn apply(&mut self, event: PollEvent) -> bool {
        match event {
            PollEvent::Balances { balances, sync } => {
                let changed = self.balances != balances || self.freshness.balances != sync;
                self.balances = balances;
                self.freshness.balances = sync;
                changed
            }
            PollEvent::LocalState { state, sync } => {
                let sync_changed = self.freshness.local_state != sync;
                self.freshness.local_state = sync;
                if state == self.local_state {
                    return sync_changed;
                }
                self.local_state = state;
                let pods = self.pods();
                let armed = self.scheduler.reschedule(&pods, self.connected);
                debug!(pods = pods.len(), armed, "local state changed");
                true
            }
        }
    }

    pub fn pods(&self) -> Vec<Pod> {
        self.local_state
            .as_ref()
            .map(|state| decode_pods(state, self.clock.now_secs()))
            .unwrap_or_default()
    }

    pub fn view(&self) -> GameState {
        GameState::aggregate(
            self.pods(),
            self.balances,
            self.local_state.as_ref(),
            self.freshness,
        )
    }

    /// Stops pending notifications and closes displayed ones; later state
    /// changes arm nothing.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.scheduler.cancel_all();
        let closed = self.scheduler.close_shown();
        info!(closed, "disconnected, notifications cancelled");
    }
}

/// Drives `controller` from a poll worker until `shutdown` resolves or the
/// worker stops on its own.
pub async fn watch<L, N, C>(
    controller: &mut GameController<N, C>,
    target: PollTarget<L>,
    intervals: PollIntervals,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    L: LedgerSource,
    N: Notifier,
    C: Clock,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(poll_worker(target, intervals, cmd_rx, event_tx));
    let _ = cmd_tx.send(PollCommand::FetchNow);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("poll worker channel closed");
                    break;
                };
                if controller.apply(event) {
                    log_summary(&controller.view());
                }
            }
            _ = &mut shutdown => {
                let _ = cmd_tx.send(PollCommand::Shutdown);
                break;
            }
        }
    }

    controller.disconnect();
    worker.await.wrap_err("poll worker panicked")?;
    Ok(())
}

/// Watches the configured account until Ctrl-C.
pub async fn run_watch(config: AppConfig) -> Result<()> {
    let ledger = AlgodClient::new(config.network.url(), config.algod_token.clone())?;
    let notifier = Arc::new(TracingNotifier::new(config.notifications));
    let permission = notifier.request_permission();
    if permission != Permission::Granted {
        info!(?permission, "notifications disabled");
    }
    let mut controller = GameController::new(notifier, SystemClock);
    let target = PollTarget {
        ledger: Arc::new(ledger),
        account: config.account.clone(),
        contract: config.contract.clone(),
    };

    info!(
        network = config.network.label(),
        url = config.network.url(),
        account = %config.account,
        app_id = config.contract.app_id,
        "watching account"
    );
    watch(&mut controller, target, config.intervals, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
        }
    })
    .await
}

/// Fetches both queries once and builds the view-model. Errors are returned
/// instead of degraded.
pub async fn fetch_game_state<L: LedgerSource>(
    target: &PollTarget<L>,
    clock: &impl Clock,
) -> Result<GameState> {
    let (balances, local_state) =
        tokio::try_join!(target.fetch_balances(), target.fetch_local_state())?;
    let pods = local_state
        .as_ref()
        .map(|state| decode_pods(state, clock.now_secs()))
        .unwrap_or_default();
    Ok(GameState::aggregate(
        pods,
        balances,
        local_state.as_ref(),
        Freshness::LIVE,
    ))
}

pub async fn fetch_once(config: AppConfig) -> Result<GameState> {
    if config.account.is_empty() {
        return Err(eyre!("no account address given"));
    }
    let ledger = AlgodClient::new(config.network.url(), config.algod_token.clone())?;
    let target = PollTarget {
        ledger: Arc::new(ledger),
        account: config.account,
        contract: config.contract,
    };
    fetch_game_state(&target, &SystemClock)
        .await
        .wrap_err("fetching game state failed")
}

fn log_summary(game: &GameState) {
    if !game.freshness.is_live() {
        warn!(
            balances = ?game.freshness.balances,
            local_state = ?game.freshness.local_state,
            "ledger data unavailable, showing defaults"
        );
    }
    info!(
        bud = %format_token_amount(game.balances.bud, TOKEN_DECIMALS),
        terp = %format_token_amount(game.balances.terp, TOKEN_DECIMALS),
        slot = game.balances.slot,
        algo = %format_token_amount(game.balances.algo, TOKEN_DECIMALS),
        active = game.active_pods,
        slots = game.pod_slots,
        harvests_for_next_slot = game.harvests_for_next_slot,
        "balances"
    );
    for pod in &game.pods {
        info!(
            pod = %pod.name,
            status = %pod.status,
            water = %format_cooldown(pod.water_cooldown_remaining),
            nutrients = %format_cooldown(pod.nutrient_cooldown_remaining),
            waters_left = pod.waters_until_harvest(),
            "pod"
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        clock::ManualClock,
        game_state::SyncState,
        notifications::{
            NotificationHandle,
            tests::RecordingNotifier,
        },
    };
    use std::time::Duration;

    const NOW: u64 = 1_700_000_000;

    fn controller(
        permission: Permission,
    ) -> (GameController<RecordingNotifier, ManualClock>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new(permission));
        let controller = GameController::new(Arc::clone(&notifier), ManualClock::at_secs(NOW));
        (controller, notifier)
    }

    fn watered_at(secs: u64) -> LocalState {
        LocalState::new()
            .with_uint("stage", 2)
            .with_uint("water_count", 4)
            .with_uint("last_watered", secs)
    }

    fn state_event(state: LocalState) -> PollEvent {
        PollEvent::LocalState {
            state: Some(state),
            sync: SyncState::Live,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn apply__new_local_state__reschedules_notifications() {
        // given
        let (mut controller, _) = controller(Permission::Granted);

        // when
        let changed = controller.apply(state_event(watered_at(NOW - 100)));

        // then
        assert!(changed);
        assert_eq!(controller.scheduler().generation(), 1);
        assert_eq!(controller.scheduler().active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn apply__identical_local_state__keeps_schedule() {
        // given
        let (mut controller, _) = controller(Permission::Granted);
        controller.apply(state_event(watered_at(NOW - 100)));

        // when
        let changed = controller.apply(state_event(watered_at(NOW - 100)));

        // then
        assert!(!changed);
        assert_eq!(controller.scheduler().generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn apply__scheduled_cooldown__fires_ready_notification() {
        // given
        let (mut controller, notifier) = controller(Permission::Granted);
        controller.apply(state_event(watered_at(NOW - 100)));

        // when
        tokio::time::sleep(Duration::from_secs(501)).await;

        // then
        assert_eq!(notifier.shown_tags(), vec!["water-ready-1".to_string()]);
    }

    #[tokio::test]
    async fn apply__failed_balance_poll__marks_balances_unavailable() {
        // given
        let (mut controller, _) = controller(Permission::Default);
        controller.apply(PollEvent::Balances {
            balances: TokenBalances {
                bud: 5,
                ..TokenBalances::default()
            },
            sync: SyncState::Live,
        });

        // when
        controller.apply(PollEvent::Balances {
            balances: TokenBalances::default(),
            sync: SyncState::Unavailable,
        });

        // then
        let view = controller.view();
        assert_eq!(view.balances, TokenBalances::default());
        assert_eq!(view.freshness.balances, SyncState::Unavailable);
    }

    #[tokio::test]
    async fn view__no_local_state__has_no_pods() {
        // given
        let (controller, _) = controller(Permission::Default);

        // when
        let view = controller.view();

        // then
        assert!(view.pods.is_empty());
        assert_eq!(view.pod_slots, 1);
        assert!(!view.freshness.is_live());
    }

    #[tokio::test]
    async fn view__clock_moves__cooldown_counts_down() {
        // given
        let notifier = Arc::new(RecordingNotifier::new(Permission::Default));
        let clock = ManualClock::at_secs(NOW);
        let mut controller = GameController::new(notifier, clock.clone());
        controller.apply(state_event(watered_at(NOW - 100)));

        // when
        clock.advance_secs(200);

        // then
        let view = controller.view();
        assert_eq!(view.pods[0].water_cooldown_remaining, 300);
        assert!(!view.pods[0].can_water);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect__pending_timers__are_cancelled_and_not_rearmed() {
        // given
        let (mut controller, notifier) = controller(Permission::Granted);
        controller.apply(state_event(watered_at(NOW - 100)));

        // when
        controller.disconnect();
        controller.apply(state_event(watered_at(NOW - 50)));
        tokio::time::sleep(Duration::from_secs(700)).await;

        // then
        assert!(!controller.is_connected());
        assert_eq!(controller.scheduler().active_count(), 0);
        assert!(notifier.shown_tags().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect__shown_notification__is_closed() {
        // given
        let (mut controller, notifier) = controller(Permission::Granted);
        controller.apply(state_event(watered_at(NOW - 100)));
        tokio::time::sleep(Duration::from_secs(501)).await;

        // when
        controller.disconnect();

        // then
        assert_eq!(notifier.closed(), vec![NotificationHandle(1)]);
    }
}
