use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{
        AtomicU64,
        Ordering,
    },
};

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;

    fn now_secs(&self) -> u64 {
        millis_to_secs(self.now_millis())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // pre-epoch clocks are treated as the epoch
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn at_secs(secs: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(secs_to_millis(secs))),
        }
    }

    pub fn advance_secs(&self, secs: u64) {
        self.millis
            .fetch_add(secs_to_millis(secs), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

pub fn millis_to_secs(millis: u64) -> u64 {
    millis / 1000
}

pub fn secs_to_millis(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}
