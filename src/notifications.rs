use crate::pods::{
    Pod,
    PodStatus,
};
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{
    debug,
    info,
};

/// Cooldowns at least this long are left unscheduled.
pub const MAX_SCHEDULE_DELAY: Duration = Duration::from_secs(24 * 60 * 60);
/// Lead time of the reminder sent ahead of a "ready" notification.
pub const REMINDER_LEAD: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Water,
    Nutrients,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Water, Action::Nutrients];

    fn tag_prefix(self) -> &'static str {
        match self {
            Action::Water => "water",
            Action::Nutrients => "nutrient",
        }
    }

    fn remaining_secs(self, pod: &Pod) -> u64 {
        match self {
            Action::Water => pod.water_cooldown_remaining,
            Action::Nutrients => pod.nutrient_cooldown_remaining,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    WaterReady,
    WaterReminder,
    NutrientReady,
    NutrientReminder,
}

impl NotificationKind {
    fn ready(action: Action) -> Self {
        match action {
            Action::Water => NotificationKind::WaterReady,
            Action::Nutrients => NotificationKind::NutrientReady,
        }
    }

    fn reminder(action: Action) -> Self {
        match action {
            Action::Water => NotificationKind::WaterReminder,
            Action::Nutrients => NotificationKind::NutrientReminder,
        }
    }

    pub fn action(self) -> Action {
        match self {
            NotificationKind::WaterReady | NotificationKind::WaterReminder => Action::Water,
            NotificationKind::NutrientReady | NotificationKind::NutrientReminder => {
                Action::Nutrients
            }
        }
    }

    pub fn is_reminder(self) -> bool {
        matches!(
            self,
            NotificationKind::WaterReminder | NotificationKind::NutrientReminder
        )
    }

    /// Stable tag a notification center can use to coalesce repeats.
    pub fn tag(self, pod_id: u8) -> String {
        let phase = if self.is_reminder() { "reminder" } else { "ready" };
        format!("{}-{phase}-{pod_id}", self.action().tag_prefix())
    }

    fn notification(self, pod_id: u8) -> Notification {
        let (title, body) = match self {
            NotificationKind::WaterReady => (
                format!("Pod #{pod_id} needs water!"),
                "Your plant is thirsty. Water it now to keep growing!",
            ),
            NotificationKind::WaterReminder => (
                format!("Pod #{pod_id} water in 30 min"),
                "Get ready! Your plant will need water soon.",
            ),
            NotificationKind::NutrientReady => (
                format!("Pod #{pod_id} ready for nutrients!"),
                "Your plant can receive nutrients now for bonus yield!",
            ),
            NotificationKind::NutrientReminder => (
                format!("Pod #{pod_id} nutrients in 30 min"),
                "Get ready! Your plant will be ready for nutrients soon.",
            ),
        };
        Notification {
            title,
            body: body.to_string(),
            tag: self.tag(pod_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub u64);

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Local notification surface.
pub trait Notifier: Send + Sync + 'static {
    fn permission(&self) -> Permission;

    fn request_permission(&self) -> Permission;

    /// Displays a notification. `None` means it was not shown.
    fn show(&self, notification: &Notification) -> Option<NotificationHandle>;

    fn close(&self, handle: NotificationHandle);
}

/// Emits notifications as structured events on the `growpod::notify` target.
#[derive(Debug)]
pub struct TracingNotifier {
    permission: Permission,
    next_handle: AtomicU64,
}

impl TracingNotifier {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            next_handle: AtomicU64::new(1),
        }
    }
}

impl Notifier for TracingNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&self) -> Permission {
        // a terminal has nobody to prompt; the configured answer stands
        self.permission
    }

    fn show(&self, notification: &Notification) -> Option<NotificationHandle> {
        if self.permission != Permission::Granted {
            return None;
        }
        let handle = NotificationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        info!(
            target: "growpod::notify",
            tag = %notification.tag,
            %handle,
            body = %notification.body,
            "{}",
            notification.title
        );
        Some(handle)
    }

    fn close(&self, handle: NotificationHandle) {
        debug!(target: "growpod::notify", %handle, "notification closed");
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedNotification {
    pub pod_id: u8,
    pub kind: NotificationKind,
    pub delay: Duration,
    pub notification: Notification,
}

/// Computes the notifications due for the given pods.
///
/// Empty pods and pods waiting for cleanup are skipped. Per pod and action a
/// "ready" notification fires when the cooldown elapses, provided that is in the
/// future and under [`MAX_SCHEDULE_DELAY`]; a reminder fires [`REMINDER_LEAD`]
/// earlier when there is still time for it.
pub fn plan_notifications(pods: &[Pod]) -> Vec<PlannedNotification> {
    let mut planned = Vec::new();
    let eligible = pods
        .iter()
        .filter(|pod| !matches!(pod.status, PodStatus::Empty | PodStatus::NeedsCleanup));
    for (pod, action) in eligible.cartesian_product(Action::ALL) {
        let delay = Duration::from_secs(action.remaining_secs(pod));
        if delay.is_zero() || delay >= MAX_SCHEDULE_DELAY {
            continue;
        }
        let ready = NotificationKind::ready(action);
        planned.push(PlannedNotification {
            pod_id: pod.id,
            kind: ready,
            delay,
            notification: ready.notification(pod.id),
        });
        if let Some(reminder_delay) = delay.checked_sub(REMINDER_LEAD)
            && !reminder_delay.is_zero()
        {
            let reminder = NotificationKind::reminder(action);
            planned.push(PlannedNotification {
                pod_id: pod.id,
                kind: reminder,
                delay: reminder_delay,
                notification: reminder.notification(pod.id),
            });
        }
    }
    planned
}

/// Owns the deferred notification timers.
///
/// Every [`reschedule`](Self::reschedule) aborts all outstanding timers before
/// planning anew, so each call starts a fresh generation. Dropping the scheduler
/// aborts everything still pending. Must be used from within a Tokio runtime.
pub struct NotificationScheduler<N: Notifier> {
    notifier: Arc<N>,
    timers: HashMap<String, JoinHandle<()>>,
    shown: Arc<Mutex<Vec<NotificationHandle>>>,
    generation: u64,
}

impl<N: Notifier> NotificationScheduler<N> {
    pub fn new(notifier: Arc<N>) -> Self {
        Self {
            notifier,
            timers: HashMap::new(),
            shown: Arc::new(Mutex::new(Vec::new())),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Timers that have not fired yet.
    pub fn active_count(&self) -> usize {
        self.timers
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Closes every notification this scheduler has displayed. Returns how
    /// many were closed.
    pub fn close_shown(&mut self) -> usize {
        let handles: Vec<_> = self
            .shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in &handles {
            self.notifier.close(*handle);
        }
        handles.len()
    }

    /// Replaces the whole schedule with one derived from `pods`.
    ///
    /// Returns the number of timers armed. Nothing is armed while disconnected
    /// or without notification permission, but earlier timers are still
    /// cancelled.
    pub fn reschedule(&mut self, pods: &[Pod], connected: bool) -> usize {
        self.cancel_all();
        self.generation += 1;
        if !connected || self.notifier.permission() != Permission::Granted {
            debug!(
                generation = self.generation,
                connected, "notifications disabled, schedule cleared"
            );
            return 0;
        }
        for planned in plan_notifications(pods) {
            let notifier = Arc::clone(&self.notifier);
            let shown = Arc::clone(&self.shown);
            let PlannedNotification {
                delay,
                notification,
                ..
            } = planned;
            let tag = notification.tag.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match notifier.show(&notification) {
                    Some(handle) => shown
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(handle),
                    None => debug!(tag = %notification.tag, "notification not shown"),
                }
            });
            if let Some(previous) = self.timers.insert(tag, handle) {
                previous.abort();
            }
        }
        debug!(
            generation = self.generation,
            scheduled = self.timers.len(),
            "notification schedule rebuilt"
        );
        self.timers.len()
    }
}

impl<N: Notifier> Drop for NotificationScheduler<N> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
