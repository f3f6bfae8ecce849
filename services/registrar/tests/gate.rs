mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedChain;
use registrar::gate::{ConfirmationGate, ConfirmationTarget, GateError, GateStatus};
use tokio_util::sync::CancellationToken;

const FAST: Duration = Duration::from_millis(1);

#[test]
fn test_target_is_fixed_offset() {
    let target = ConfirmationTarget::new(100, 12);
    assert_eq!(target.target_height, 112);
    assert!(!target.is_reached(111));
    assert!(target.is_reached(112));
    assert!(target.is_reached(500));
}

#[tokio::test]
async fn test_gate_resolves_at_target() {
    let chain = Arc::new(ScriptedChain::new().with_heights(&[100, 105, 111, 112, 113]));
    let gate = ConfirmationGate::create(chain.clone(), 12, FAST).await.unwrap();
    assert_eq!(gate.target().target_height, 112);

    let reached = gate.await_reached(&CancellationToken::new()).await.unwrap();
    assert_eq!(reached, 112);
    // one read at creation, three polls
    assert_eq!(chain.count("getblockcount"), 4);
}

#[tokio::test]
async fn test_poll_is_single_check() {
    let chain = Arc::new(ScriptedChain::new().with_heights(&[100, 111, 112]));
    let gate = ConfirmationGate::create(chain.clone(), 12, FAST).await.unwrap();

    assert_eq!(gate.poll().await.unwrap(), GateStatus::Pending { height: 111 });
    assert_eq!(gate.poll().await.unwrap(), GateStatus::Reached { height: 112 });
}

#[tokio::test]
async fn test_lower_heights_never_release() {
    // a reorg drops the height; the target does not move
    let chain = Arc::new(ScriptedChain::new().with_heights(&[100, 111, 95, 104, 111, 112]));
    let gate = ConfirmationGate::create(chain.clone(), 12, FAST).await.unwrap();

    let reached = gate.await_reached(&CancellationToken::new()).await.unwrap();
    assert_eq!(reached, 112);
    assert_eq!(gate.target().target_height, 112);
    assert_eq!(chain.count("getblockcount"), 6);
}

#[tokio::test]
async fn test_zero_depth_resolves_immediately() {
    let chain = Arc::new(ScriptedChain::new().with_heights(&[42]));
    let gate = ConfirmationGate::create(chain.clone(), 0, FAST).await.unwrap();
    assert_eq!(gate.await_reached(&CancellationToken::new()).await.unwrap(), 42);
}

#[tokio::test]
async fn test_cancellation_releases_wait() {
    let chain = Arc::new(ScriptedChain::new().with_heights(&[100]));
    let gate = ConfirmationGate::create(chain, 12, Duration::from_millis(5)).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), gate.await_reached(&cancel))
        .await
        .expect("gate did not observe cancellation");
    assert!(matches!(result, Err(GateError::Cancelled { target_height: 112 })));
}

#[tokio::test]
async fn test_height_query_failure_surfaces() {
    let chain = Arc::new(ScriptedChain::new().failing("getblockcount"));
    let result = ConfirmationGate::create(chain, 12, FAST).await;
    assert!(result.is_err());
}
