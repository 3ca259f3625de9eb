use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A source of the current time.
///
/// Everything that compares against poll schedules asks a `Clock` rather than
/// the system directly, so tests can pin time down.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The clock that is managed by Rocket and injected into handlers.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

/// A clock stuck at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn fixed_clock_does_not_move() {
        let then = Utc::now() - Duration::days(3);
        let clock: SharedClock = Arc::new(FixedClock(then));
        assert_eq!(clock.now(), then);
        assert_eq!(clock.now(), then);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::shared();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
