mod common;

use std::sync::Arc;

use tokio::time::{sleep, Duration, Instant};

use common::FlakyStore;
use sharelimit::{
    Coordinator, MemoryStore, PeerId, PeerSettings, ShareLimitError, TokenBucketGate, WaitContext,
};

const HEARTBEAT: Duration = Duration::from_secs(1);

fn start_peer(id: &str, total_budget: u32, store: Arc<FlakyStore>) -> Coordinator {
    let settings = PeerSettings::new(total_budget)
        .with_peer_id(id)
        .with_heartbeat_interval(HEARTBEAT);
    Coordinator::start(settings, store, Arc::new(TokenBucketGate::new())).unwrap()
}

fn ids(names: &[&str]) -> Vec<PeerId> {
    names.iter().map(|n| PeerId::from(*n)).collect()
}

#[tokio::test(start_paused = true)]
async fn test_three_peers_split_budget() {
    let shared = Arc::new(MemoryStore::new());
    let peers: Vec<Coordinator> = ["caller0", "caller1", "caller2"]
        .iter()
        .map(|id| start_peer(id, 10, Arc::new(FlakyStore::new(shared.clone()))))
        .collect();

    sleep(HEARTBEAT * 2 + HEARTBEAT / 2).await;

    let expected = ids(&["caller0", "caller1", "caller2"]);
    for peer in &peers {
        assert_eq!(peer.peer_set(), expected);
    }
    let shares: Vec<u32> = peers.iter().map(|p| p.current_share()).collect();
    assert_eq!(shares, vec![4, 3, 3]);
    let rates: Vec<u32> = peers.iter().map(|p| p.rate()).collect();
    assert_eq!(rates, vec![4, 3, 3]);

    for peer in peers {
        peer.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_peer_admits_its_share() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    let coordinator = start_peer("solo", 2, store);

    sleep(HEARTBEAT + HEARTBEAT / 2).await;
    assert_eq!(coordinator.rate(), 2);

    let start = Instant::now();
    let mut admitted = 0;
    while start.elapsed() < Duration::from_secs(3) {
        coordinator
            .wait(&WaitContext::background(), false)
            .await
            .unwrap();
        admitted += 1;
    }
    // 2 per second over 3 seconds, give or take the bucket edges
    assert!((4..=8).contains(&admitted), "admitted {}", admitted);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_peer_that_cannot_announce_is_excluded() {
    let shared = Arc::new(MemoryStore::new());
    let a = start_peer("a", 10, Arc::new(FlakyStore::new(shared.clone())));
    let b = start_peer("b", 10, Arc::new(FlakyStore::new(shared.clone())));
    let c = start_peer(
        "c",
        10,
        Arc::new(FlakyStore::failing_announces_for(shared.clone(), "c")),
    );

    sleep(HEARTBEAT * 2 + HEARTBEAT / 2).await;

    assert_eq!(a.peer_set(), ids(&["a", "b"]));
    assert_eq!(b.peer_set(), ids(&["a", "b"]));
    assert_eq!(a.current_share(), 5);
    assert_eq!(b.current_share(), 5);

    assert_eq!(c.current_share(), 0);
    assert_eq!(c.rate(), 0);
    let err = c.wait(&WaitContext::background(), true).await.unwrap_err();
    assert!(matches!(err, ShareLimitError::Unavailable));

    for peer in [a, b, c] {
        peer.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_discover_failure_closes_gate() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    let coordinator = start_peer("solo", 6, store.clone());

    sleep(HEARTBEAT + HEARTBEAT / 2).await;
    assert_eq!(coordinator.rate(), 6);

    store.set_fail_discover(true);
    sleep(HEARTBEAT).await;
    assert_eq!(coordinator.rate(), 0);
    let err = coordinator
        .wait(&WaitContext::background(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareLimitError::Unavailable));

    store.set_fail_discover(false);
    sleep(HEARTBEAT).await;
    assert_eq!(coordinator.rate(), 6);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_announce_failure_closes_gate_and_skips_discover() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    let coordinator = start_peer("solo", 6, store.clone());

    sleep(HEARTBEAT + HEARTBEAT / 2).await;
    assert_eq!(coordinator.rate(), 6);

    store.set_fail_announce(true);
    sleep(HEARTBEAT).await;
    assert_eq!(coordinator.rate(), 0);
    assert!(coordinator.peer().last_announce_failed());

    // discover is skipped on the tick after a failed announce
    sleep(HEARTBEAT).await;
    assert_eq!(coordinator.rate(), 0);

    store.set_fail_announce(false);
    sleep(HEARTBEAT * 2).await;
    assert_eq!(coordinator.rate(), 6);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_blocked_waiter_released_once_share_known() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    let coordinator = Arc::new(start_peer("solo", 4, store));

    // nothing is known about the fleet before the first full tick
    let start = Instant::now();
    let waiter = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.wait(&WaitContext::background(), false).await })
    };
    waiter.await.unwrap().unwrap();
    assert!(start.elapsed() >= HEARTBEAT);

    match Arc::try_unwrap(coordinator) {
        Ok(coordinator) => coordinator.shutdown().await,
        Err(_) => panic!("coordinator still shared"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_honored_through_coordinator() {
    let store = Arc::new(FlakyStore::new(Arc::new(MemoryStore::new())));
    store.set_fail_announce(true);
    let coordinator = start_peer("isolated", 4, store);

    let timeout = Duration::from_millis(500);
    let start = Instant::now();
    let err = coordinator
        .wait(&WaitContext::with_timeout(timeout), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ShareLimitError::DeadlineExceeded));
    let elapsed = start.elapsed();
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(10));

    let (ctx, handle) = WaitContext::cancellable();
    handle.cancel();
    let err = coordinator.wait(&ctx, false).await.unwrap_err();
    assert!(matches!(err, ShareLimitError::Cancelled));

    coordinator.shutdown().await;
}
