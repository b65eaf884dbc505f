use super::*;
use labcache_types::models::check_disjoint;
use labcache_types::{AssignError, ServiceState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::frontend::Frontend;

/// Inventory that replays scripted responses, then repeats the last one.
struct FakeInventory {
    responses: parking_lot::Mutex<VecDeque<Result<Vec<CachingService>, InventoryError>>>,
    last: parking_lot::Mutex<Option<Result<Vec<CachingService>, InventoryError>>>,
    timeouts: parking_lot::Mutex<Vec<Duration>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeInventory {
    fn new(responses: Vec<Result<Vec<CachingService>, InventoryError>>) -> Arc<Self> {
        Self::with_delay(responses, Duration::ZERO)
    }

    fn with_delay(
        responses: Vec<Result<Vec<CachingService>, InventoryError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: parking_lot::Mutex::new(responses.into()),
            last: parking_lot::Mutex::new(None),
            timeouts: parking_lot::Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn list_caching_services(
        &self,
        timeout: Duration,
    ) -> Result<Vec<CachingService>, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeouts.lock().push(timeout);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.responses.lock().pop_front();
        match next {
            Some(response) => {
                *self.last.lock() = Some(response.clone());
                response
            },
            None => self.last.lock().clone().unwrap_or_else(|| Ok(Vec::new())),
        }
    }
}

fn serving(name: &str, port: i64, subnets: &[&str]) -> CachingService {
    CachingService::new(
        name,
        port,
        subnets.iter().map(|s| s.to_string()).collect(),
        ServiceState::Serving,
    )
}

fn unavailable() -> InventoryError {
    InventoryError::Status { code: 503, body: "unavailable".to_string() }
}

fn no_probe() -> Arc<dyn HealthProbe> {
    Arc::new(|_: &str| true)
}

async fn env_with(fake: &Arc<FakeInventory>) -> InventoryEnv {
    let client: Arc<dyn InventoryClient> = fake.clone();
    InventoryEnv::with_probe(client, no_probe()).await.expect("initial fetch succeeds")
}

fn summary(topology: &Topology) -> Vec<(String, Vec<String>)> {
    topology.iter().map(|s| (s.cidr().to_string(), s.backends().to_vec())).collect()
}

async fn expire(env: &InventoryEnv) {
    let remaining = env.next_refresh().saturating_duration_since(Instant::now());
    tokio::time::advance(remaining + Duration::from_secs(1)).await;
}

#[test]
fn test_assemble_keeps_only_serving() {
    let mut testing = serving("cachingservice/1.1.1.2", 8001, &["1.1.1.0/24"]);
    testing.state = ServiceState::DeployedTesting;

    let topology = assemble_inventory_topology(&[
        serving("cachingservice/1.1.1.1", 8001, &["1.1.1.0/24"]),
        testing,
    ]);

    assert_eq!(summary(&topology), vec![("1.1.1.0/24".to_string(), vec!["http://1.1.1.1:8001".to_string()])]);
}

#[test]
fn test_assemble_sorts_backends_and_masks_cidrs() {
    let topology = assemble_inventory_topology(&[
        serving("cache-b", 8001, &["1.1.1.7/24"]),
        serving("cache-a", 8001, &["1.1.1.0/24"]),
        serving("cache-c", 9000, &[" 1.1.1.0/24 "]),
    ]);

    assert_eq!(
        summary(&topology),
        vec![(
            "1.1.1.0/24".to_string(),
            vec![
                "http://cache-a:8001".to_string(),
                "http://cache-b:8001".to_string(),
                "http://cache-c:9000".to_string()
            ]
        )]
    );
}

#[test]
fn test_assemble_drops_malformed_records() {
    let topology = assemble_inventory_topology(&[
        serving("cachingservice/1.1.1.1", 0, &["1.1.1.0/24"]),
        serving("cachingservice/", 8001, &["1.1.2.0/24"]),
        serving("cachingservice/1.1.3.1", 8001, &["not-a-cidr", "1.1.3.0/24"]),
        serving("cache with spaces", 8001, &["1.1.4.0/24"]),
    ]);

    assert_eq!(summary(&topology), vec![("1.1.3.0/24".to_string(), vec!["http://1.1.3.1:8001".to_string()])]);
}

#[test]
fn test_assemble_result_is_disjoint() {
    let topology = assemble_inventory_topology(&[
        serving("cache-a", 8001, &["10.0.0.0/8"]),
        serving("cache-b", 8001, &["10.1.0.0/16", "11.0.0.0/8"]),
    ]);

    assert!(check_disjoint(topology.iter().map(Subnet::cidr)).is_ok());
    assert_eq!(topology.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_serving_subnets_share_backend() {
    let fake = FakeInventory::new(vec![Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24", "1.1.2.0/24"])])]);
    let env = env_with(&fake).await;

    let topology = env.snapshot(&CallContext::background()).await;
    assert_eq!(
        summary(&topology),
        vec![
            ("1.1.1.0/24".to_string(), vec!["http://1.1.1.1:8001".to_string()]),
            ("1.1.2.0/24".to_string(), vec!["http://1.1.1.1:8001".to_string()]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_initial_fetch_failure_is_fatal() {
    let fake = FakeInventory::new(vec![Err(unavailable())]);
    let client: Arc<dyn InventoryClient> = fake.clone();

    let result = InventoryEnv::with_probe(client, no_probe()).await;
    match result {
        Err(EnvironmentError::InitializationFailed { provider, message }) => {
            assert_eq!(provider, "inventory");
            assert!(message.contains("503"), "unexpected message: {message}");
        },
        Ok(_) => panic!("expected initialization failure"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_empty_inventory_is_fatal() {
    let mut retired = serving("1.1.1.1", 8001, &["1.1.1.0/24"]);
    retired.state = ServiceState::Decommissioned;
    let fake = FakeInventory::new(vec![Ok(vec![retired])]);
    let client: Arc<dyn InventoryClient> = fake.clone();

    assert!(InventoryEnv::with_probe(client, no_probe()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_no_refresh_before_deadline() {
    let fake = FakeInventory::new(vec![Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])])]);
    let env = env_with(&fake).await;
    let ctx = CallContext::background();

    tokio::time::advance(REFRESH_INTERVAL - Duration::from_secs(1)).await;
    env.snapshot(&ctx).await;
    env.snapshot(&ctx).await;

    assert_eq!(fake.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_snapshot_survives_failed_refresh() {
    let fake = FakeInventory::new(vec![
        Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]),
        Err(unavailable()),
    ]);
    let env = env_with(&fake).await;
    let ctx = CallContext::background();

    let first = env.snapshot(&ctx).await;
    let old_deadline = env.next_refresh();

    expire(&env).await;
    let second = env.snapshot(&ctx).await;

    assert_eq!(fake.calls(), 2);
    assert_eq!(first, second);
    assert_eq!(summary(&second), vec![("1.1.1.0/24".to_string(), vec!["http://1.1.1.1:8001".to_string()])]);
    assert!(env.next_refresh() > old_deadline);

    // The failure pushed the deadline out; no retry on the very next call.
    env.snapshot(&ctx).await;
    assert_eq!(fake.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_successful_refresh_replaces_snapshot() {
    let fake = FakeInventory::new(vec![
        Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]),
        Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"]), serving("1.1.1.2", 8001, &["1.1.1.0/24"])]),
    ]);
    let env = env_with(&fake).await;
    let ctx = CallContext::background();

    let before = env.snapshot(&ctx).await;
    expire(&env).await;
    let after = env.snapshot(&ctx).await;

    assert_eq!(before[0].backends().len(), 1);
    assert_eq!(after[0].backends(), &["http://1.1.1.1:8001", "http://1.1.1.2:8001"]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_refresh_keeps_previous_snapshot() {
    let fake = FakeInventory::new(vec![Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]), Ok(vec![])]);
    let env = env_with(&fake).await;
    let ctx = CallContext::background();

    expire(&env).await;
    let topology = env.snapshot(&ctx).await;

    assert_eq!(fake.calls(), 2);
    assert_eq!(topology.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_refresh() {
    let fake = FakeInventory::with_delay(
        vec![
            Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]),
            Ok(vec![serving("1.1.1.2", 8001, &["1.1.1.0/24"])]),
        ],
        Duration::from_millis(500),
    );
    let env = Arc::new(env_with(&fake).await);
    expire(&env).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let env = Arc::clone(&env);
            tokio::spawn(async move { env.snapshot(&CallContext::background()).await })
        })
        .collect();
    let snapshots = futures::future::join_all(handles).await;

    assert_eq!(fake.calls(), 2);
    for snapshot in snapshots {
        let snapshot = snapshot.expect("task completes");
        assert_eq!(snapshot.len(), 1);
    }
    let settled = env.snapshot(&CallContext::background()).await;
    assert_eq!(settled[0].backends(), &["http://1.1.1.2:8001"]);
}

#[tokio::test(start_paused = true)]
async fn test_caller_deadline_shortens_rpc_timeout() {
    let fake = FakeInventory::new(vec![Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])])]);
    let env = env_with(&fake).await;
    expire(&env).await;

    let ctx = CallContext::background().with_timeout(Duration::from_secs(2));
    env.snapshot(&ctx).await;

    let timeouts = fake.timeouts.lock().clone();
    assert_eq!(timeouts, vec![INVENTORY_RPC_TIMEOUT, Duration::from_secs(2)]);
}

fn cancel_after(ctx: &CallContext, after: Duration) -> tokio::task::JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        ctx.cancel();
    })
}

#[tokio::test(start_paused = true)]
async fn test_deadline_starts_one_interval_out() {
    let fake = FakeInventory::new(vec![Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])])]);
    let env = env_with(&fake).await;

    assert_eq!(env.next_refresh(), Instant::now() + REFRESH_INTERVAL);

    tokio::time::advance(Duration::from_secs(90)).await;
    expire(&env).await;
    env.snapshot(&CallContext::background()).await;
    assert_eq!(env.next_refresh(), Instant::now() + REFRESH_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_caller_abandons_refresh() {
    let fake = FakeInventory::with_delay(
        vec![
            Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]),
            Ok(vec![serving("1.1.1.2", 8001, &["1.1.1.0/24"])]),
        ],
        Duration::from_secs(3),
    );
    let env = env_with(&fake).await;
    expire(&env).await;
    let old_deadline = env.next_refresh();

    let ctx = CallContext::background();
    let canceller = cancel_after(&ctx, Duration::from_secs(1));
    let started = Instant::now();
    let topology = env.snapshot(&ctx).await;
    canceller.await.expect("canceller finished");

    assert!(started.elapsed() < Duration::from_secs(3), "snapshot waited for the abandoned fetch");
    assert_eq!(topology[0].backends(), &["http://1.1.1.1:8001"]);
    assert_eq!(fake.calls(), 2);
    assert!(env.next_refresh() > old_deadline);

    // The abandoned fetch never lands and is not retried before the new deadline.
    tokio::time::advance(Duration::from_secs(5)).await;
    let later = env.snapshot(&CallContext::background()).await;
    assert_eq!(later[0].backends(), &["http://1.1.1.1:8001"]);
    assert_eq!(fake.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_refresh_fails_assignment() {
    let fake = FakeInventory::with_delay(
        vec![
            Ok(vec![serving("1.1.1.1", 8001, &["1.1.1.0/24"])]),
            Ok(vec![serving("1.1.1.2", 8001, &["1.1.1.0/24"])]),
        ],
        Duration::from_secs(3),
    );
    let env = Arc::new(env_with(&fake).await);
    expire(&env).await;
    let old_deadline = env.next_refresh();

    let frontend = Frontend::new(env.clone());
    let ctx = CallContext::background();
    let canceller = cancel_after(&ctx, Duration::from_secs(1));

    let result = frontend.assign_backend_with(&ctx, "1.1.1.5", "path/to/file").await;
    canceller.await.expect("canceller finished");

    assert_eq!(result, Err(AssignError::Cancelled));
    assert_eq!(fake.calls(), 2);
    assert!(env.next_refresh() > old_deadline);

    let topology = env.snapshot(&CallContext::background()).await;
    assert_eq!(summary(&topology), vec![("1.1.1.0/24".to_string(), vec!["http://1.1.1.1:8001".to_string()])]);
}
