//! Blocks the session until a named replication LSN is reached (spec §2
//! `WaitForLsn`, §4.8 note in §9: "the richest... form, which a strict
//! reading must implement").

use crate::error::CatalogError;
use std::time::Duration;
use tokio::time::{timeout, Instant};

pub type Lsn = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    StandbyReplay,
    StandbyWrite,
    StandbyFlush,
    PrimaryFlush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
    RecoveryEnded,
}

impl WaitOutcome {
    pub const fn as_status_str(self) -> &'static str {
        match self {
            WaitOutcome::Reached => "reached",
            WaitOutcome::TimedOut => "timeout",
            WaitOutcome::RecoveryEnded => "recovery ended",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaitForLsnArgs {
    pub target: Lsn,
    pub mode: Mode,
    /// `0` means wait forever (spec §6).
    pub timeout: Duration,
    pub no_throw: bool,
}

/// What the caller currently observes about recovery/snapshot state; the
/// catalog core never reads this itself (spec §1 Non-goals: replication
/// transport), it only enforces the preconditions spec §3 invariant 6 and
/// §7 describe.
#[derive(Debug, Clone, Copy)]
pub struct ReplicationState {
    pub in_recovery: bool,
    pub has_active_or_registered_snapshot: bool,
}

/// Polls `current_lsn` (an injected accessor, since observing real
/// replication progress is the replication-transport collaborator's job —
/// spec §1 Non-goals) until it reaches `target`, `state.in_recovery`
/// flips off (for the standby modes), or the timeout elapses.
pub async fn wait_for_lsn(
    args: WaitForLsnArgs,
    state: &ReplicationState,
    mut current_lsn: impl FnMut() -> Lsn,
    mut poll_interval: impl FnMut() -> Duration,
) -> Result<WaitOutcome, CatalogError> {
    // No-snapshot precondition (spec §3 invariant 6, S6).
    if state.has_active_or_registered_snapshot {
        return precondition_violation(
            args.no_throw,
            "WaitForLsn called while holding an active or registered snapshot",
        );
    }

    if args.mode == Mode::PrimaryFlush && state.in_recovery {
        return precondition_violation(args.no_throw, "primary_flush requested during recovery");
    }
    if args.mode != Mode::PrimaryFlush && !state.in_recovery {
        return precondition_violation(
            args.no_throw,
            "standby wait mode requested while not in recovery",
        );
    }

    let deadline_wait = async {
        loop {
            if args.mode != Mode::PrimaryFlush && !state.in_recovery {
                return WaitOutcome::RecoveryEnded;
            }
            if current_lsn() >= args.target {
                return WaitOutcome::Reached;
            }
            tokio::time::sleep(poll_interval()).await;
        }
    };

    if args.timeout.is_zero() {
        return Ok(deadline_wait.await);
    }

    let start = Instant::now();
    match timeout(args.timeout, deadline_wait).await {
        Ok(outcome) => Ok(outcome),
        Err(_) => {
            let _ = start.elapsed();
            if args.no_throw {
                Ok(WaitOutcome::TimedOut)
            } else {
                Err(CatalogError::QueryCanceled(format!(
                    "timed out after waiting for LSN {} in mode {:?}",
                    args.target, args.mode
                )))
            }
        }
    }
}

/// A precondition failure (already-holding a snapshot, wrong mode for the
/// current recovery state) is a caller bug, not a race to poll around, so
/// `no_throw` does not downgrade it to a status string the way it does for
/// a plain timeout.
fn precondition_violation(_no_throw: bool, message: &str) -> Result<WaitOutcome, CatalogError> {
    Err(CatalogError::ObjectNotInPrerequisiteState(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// S6: WaitForLsn precondition.
    #[tokio::test]
    async fn rejects_call_with_active_snapshot() {
        let state = ReplicationState {
            in_recovery: true,
            has_active_or_registered_snapshot: true,
        };
        let args = WaitForLsnArgs {
            target: 100,
            mode: Mode::StandbyReplay,
            timeout: Duration::from_millis(10),
            no_throw: false,
        };
        let result = wait_for_lsn(args, &state, || 0, || Duration::from_millis(1)).await;
        assert!(matches!(result, Err(CatalogError::ObjectNotInPrerequisiteState(_))));
    }

    #[tokio::test]
    async fn reaches_target_immediately_when_already_there() {
        let state = ReplicationState {
            in_recovery: true,
            has_active_or_registered_snapshot: false,
        };
        let args = WaitForLsnArgs {
            target: 100,
            mode: Mode::StandbyReplay,
            timeout: Duration::from_secs(1),
            no_throw: false,
        };
        let result = wait_for_lsn(args, &state, || 200, || Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(result, WaitOutcome::Reached);
    }

    #[tokio::test]
    async fn times_out_and_returns_status_string_with_no_throw() {
        let state = ReplicationState {
            in_recovery: true,
            has_active_or_registered_snapshot: false,
        };
        let args = WaitForLsnArgs {
            target: 100,
            mode: Mode::StandbyReplay,
            timeout: Duration::from_millis(5),
            no_throw: true,
        };
        let result = wait_for_lsn(args, &state, || 0, || Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(result, WaitOutcome::TimedOut);
        assert_eq!(result.as_status_str(), "timeout");
    }

    #[tokio::test]
    async fn times_out_and_raises_without_no_throw() {
        let state = ReplicationState {
            in_recovery: true,
            has_active_or_registered_snapshot: false,
        };
        let args = WaitForLsnArgs {
            target: 100,
            mode: Mode::StandbyReplay,
            timeout: Duration::from_millis(5),
            no_throw: false,
        };
        let result = wait_for_lsn(args, &state, || 0, || Duration::from_millis(1)).await;
        assert!(matches!(result, Err(CatalogError::QueryCanceled(_))));
    }

    #[tokio::test]
    async fn eventually_reaches_a_target_that_advances() {
        let lsn = Arc::new(AtomicU64::new(0));
        let lsn2 = lsn.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            lsn2.store(500, Ordering::SeqCst);
        });
        let state = ReplicationState {
            in_recovery: true,
            has_active_or_registered_snapshot: false,
        };
        let args = WaitForLsnArgs {
            target: 500,
            mode: Mode::StandbyReplay,
            timeout: Duration::from_secs(1),
            no_throw: false,
        };
        let result = wait_for_lsn(args, &state, || lsn.load(Ordering::SeqCst), || Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(result, WaitOutcome::Reached);
    }
}
