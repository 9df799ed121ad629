//! S6: WaitForLsn precondition and outcome scenarios (spec §8).

use catalog_core::error::CatalogError;
use catalog_core::wait_for_lsn::{wait_for_lsn, Mode, ReplicationState, WaitForLsnArgs, WaitOutcome};
use std::time::Duration;

#[tokio::test]
async fn primary_flush_mode_is_rejected_while_in_recovery() {
    let state = ReplicationState {
        in_recovery: true,
        has_active_or_registered_snapshot: false,
    };
    let args = WaitForLsnArgs {
        target: 1,
        mode: Mode::PrimaryFlush,
        timeout: Duration::from_millis(10),
        no_throw: false,
    };
    let result = wait_for_lsn(args, &state, || 0, || Duration::from_millis(1)).await;
    assert!(matches!(result, Err(CatalogError::ObjectNotInPrerequisiteState(_))));
}

#[tokio::test]
async fn standby_mode_while_not_in_recovery_is_also_rejected() {
    let state = ReplicationState {
        in_recovery: false,
        has_active_or_registered_snapshot: false,
    };
    let args = WaitForLsnArgs {
        target: 1,
        mode: Mode::StandbyFlush,
        timeout: Duration::from_millis(10),
        no_throw: false,
    };
    let result = wait_for_lsn(args, &state, || 0, || Duration::from_millis(1)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn primary_flush_mode_outside_recovery_reaches_a_target_already_met() {
    let state = ReplicationState {
        in_recovery: false,
        has_active_or_registered_snapshot: false,
    };
    let args = WaitForLsnArgs {
        target: 10,
        mode: Mode::PrimaryFlush,
        timeout: Duration::from_millis(20),
        no_throw: true,
    };
    let result = wait_for_lsn(args, &state, || 50, || Duration::from_millis(1)).await.unwrap();
    assert_eq!(result, WaitOutcome::Reached);
}
