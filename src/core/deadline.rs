use std::time::Duration;
use tokio::time::Instant;

/// Propagated deadline. Every suspension point in the pipeline derives its
/// timeout from one of these rather than from configuration directly.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

/// Minimum usable time for any pipeline stage.
pub const STAGE_FLOOR: Duration = Duration::from_secs(1);

impl Deadline {
    pub fn after(d: Duration) -> Self {
        Self {
            at: Instant::now() + d,
        }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Cap a sub-operation timeout by the remaining time.
    pub fn clamp(&self, d: Duration) -> Duration {
        d.min(self.remaining())
    }
}

/// Per-stage deadline derived from the request deadline.
///
/// When the remaining time at stage start has dropped below the stage floor,
/// a fresh background deadline of `2 × STAGE_FLOOR` is issued instead so
/// partial work is preserved; `rescued` marks that case. If a rescued stage
/// fails, the caller reports the original deadline error.
#[derive(Debug, Clone, Copy)]
pub struct StageBudget {
    pub deadline: Deadline,
    pub rescued: bool,
}

pub fn stage_budget(overall: Deadline, cap: Duration) -> StageBudget {
    let remaining = overall.remaining();
    if remaining < STAGE_FLOOR {
        StageBudget {
            deadline: Deadline::after(STAGE_FLOOR * 2),
            rescued: true,
        }
    } else {
        StageBudget {
            deadline: Deadline::after(remaining.min(cap)),
            rescued: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let d = Deadline::after(Duration::from_secs(10));
        assert!(!d.expired());
        tokio::time::advance(Duration::from_secs(4)).await;
        let rem = d.remaining();
        assert!(rem <= Duration::from_secs(6));
        assert!(rem > Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(d.expired());
        assert_eq!(d.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_budget_caps_and_rescues() {
        let overall = Deadline::after(Duration::from_secs(30));
        let stage = stage_budget(overall, Duration::from_secs(5));
        assert!(!stage.rescued);
        assert!(stage.deadline.remaining() <= Duration::from_secs(5));

        tokio::time::advance(Duration::from_millis(29_500)).await;
        let rescued = stage_budget(overall, Duration::from_secs(5));
        assert!(rescued.rescued);
        let rem = rescued.deadline.remaining();
        assert!(rem > Duration::from_secs(1) && rem <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn clamp_never_exceeds_remaining() {
        let d = Deadline::after(Duration::from_secs(3));
        assert_eq!(d.clamp(Duration::from_secs(10)), d.remaining());
        assert_eq!(d.clamp(Duration::from_secs(1)), Duration::from_secs(1));
    }
}
