//! Client engine against the embedded hub and a scripted fake hub.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;

use globalstore_client::{ClientOptions, ClientState, GlobalStorage};
use globalstore_core::error::Result;
use globalstore_core::origin::origin_of;
use globalstore_core::protocol::{Reply, Request, READY_SENTINEL};
use globalstore_core::transport::{pair, Connector, Port, TargetOrigin};
use globalstore_core::{AccessPattern, ErrorCode};
use globalstore_hub::policy::HubPolicy;
use globalstore_hub::store::MemoryStore;
use globalstore_hub::{EmbeddedHub, Hub};

const APP: &str = "https://app.example.com";
const OTHER: &str = "https://www.other.net";
const HUB_URL: &str = "https://hub.example.net/hub.html";
const HUB: &str = "https://hub.example.net";

fn opts() -> ClientOptions {
    ClientOptions::default()
        .with_url(HUB_URL)
        .with_timeout(Duration::from_millis(300))
}

fn embedded(allow: &str) -> (Arc<EmbeddedHub>, MemoryStore) {
    let store = MemoryStore::new();
    let policy = HubPolicy::new(AccessPattern::new(allow).unwrap(), false);
    let hub = Hub::new(policy, store.clone()).unwrap();
    (Arc::new(EmbeddedHub::new(hub)), store)
}

async fn ready_client(origin: &str, connector: Arc<EmbeddedHub>, opts: ClientOptions) -> GlobalStorage {
    let client = GlobalStorage::new(origin, connector).unwrap();
    client.init(opts).await.unwrap();
    client
}

/// Connector that hands the hub side of each connection to the test.
struct Scripted {
    ports: mpsc::UnboundedSender<Port>,
    connects: AtomicUsize,
}

impl Scripted {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Port>) {
        let (ports, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                ports,
                connects: AtomicUsize::new(0),
            }),
            rx,
        )
    }
}

#[async_trait]
impl Connector for Scripted {
    async fn connect(&self, hub_url: &Url, parent_origin: &str) -> Result<Port> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (parent, child) = pair(Some(parent_origin.to_string()), Some(origin_of(hub_url)));
        self.ports.send(child).unwrap();
        Ok(parent)
    }
}

/// Connector whose `connect` never completes.
struct Stalled;

#[async_trait]
impl Connector for Stalled {
    async fn connect(&self, _hub_url: &Url, _parent_origin: &str) -> Result<Port> {
        std::future::pending::<Result<Port>>().await
    }
}

fn send_ready(hub: &Port) {
    hub.post(json!(READY_SENTINEL), &TargetOrigin::Any).unwrap();
}

async fn next_request(hub: &mut Port) -> Request {
    let env = hub.recv().await.unwrap();
    Request::from_value(&env.data).unwrap()
}

fn reply(hub: &Port, id: &str, value: Value) {
    hub.post(serde_json::to_value(Reply::ok(id, value)).unwrap(), &TargetOrigin::Any)
        .unwrap();
}

/// Client connected to a scripted hub that has already signalled ready.
async fn scripted_ready() -> (GlobalStorage, Port) {
    scripted_ready_with(opts()).await
}

async fn scripted_ready_with(opts: ClientOptions) -> (GlobalStorage, Port) {
    let (connector, mut ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector).unwrap();
    let init = client.init(opts);
    let script = async {
        let hub = ports.recv().await.unwrap();
        send_ready(&hub);
        hub
    };
    let (res, hub) = tokio::join!(init, script);
    res.unwrap();
    (client, hub)
}

// --------------------
// Lifecycle
// --------------------

#[tokio::test]
async fn requests_before_init_fail_not_ready() {
    let (connector, _) = embedded(".*");
    let client = GlobalStorage::new(APP, connector).unwrap();
    assert!(matches!(client.state(), ClientState::Idle));
    assert_eq!(client.get_item("k").await.unwrap_err().code(), ErrorCode::NotReady);
    assert_eq!(client.set_item("k", 1).await.unwrap_err().code(), ErrorCode::NotReady);
    assert_eq!(client.remove_item("k").await.unwrap_err().code(), ErrorCode::NotReady);
    assert_eq!(client.clear().await.unwrap_err().code(), ErrorCode::NotReady);
}

#[tokio::test]
async fn self_excluding_pattern_fails_before_connecting() {
    let (connector, _ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector.clone()).unwrap();
    let err = client
        .init(opts().with_allow("^other\\.net$"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SelfPolicyMismatch);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    assert!(matches!(client.state(), ClientState::Idle));
}

#[tokio::test]
async fn bad_options_are_configuration_errors() {
    let (connector, _) = embedded(".*");
    let client = GlobalStorage::new(APP, connector).unwrap();
    let err = client.init(opts().with_url("not a url")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Configuration);
    let err = client.init(opts().with_allow("([")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Configuration);
}

#[tokio::test]
async fn init_reaches_ready_and_is_idempotent() {
    let (connector, mut ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector.clone()).unwrap();

    let script = async {
        let hub = ports.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        send_ready(&hub);
        hub
    };
    let (a, b, _hub) = tokio::join!(client.init(opts()), client.init(opts()), script);
    a.unwrap();
    b.unwrap();
    assert!(matches!(client.state(), ClientState::Ready));

    client.init(opts()).await.unwrap();
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn silent_hub_times_out_init() {
    let (connector, mut ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector.clone()).unwrap();
    let (res, _hub) = tokio::join!(client.init(opts()), async { ports.recv().await.unwrap() });
    assert_eq!(res.unwrap_err().code(), ErrorCode::Timeout);
    assert!(matches!(client.state(), ClientState::Failed(_)));
    assert_eq!(client.pending(), 0);

    // terminal: same outcome, no second child context
    assert_eq!(client.init(opts()).await.unwrap_err().code(), ErrorCode::Timeout);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(client.get_item("k").await.unwrap_err().code(), ErrorCode::NotReady);
}

#[tokio::test]
async fn dropped_init_still_settles() {
    let (connector, mut ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector.clone()).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), client.init(opts())).await;
    assert!(abandoned.is_err());
    let _hub = ports.recv().await.unwrap();

    let res = tokio::time::timeout(Duration::from_secs(3), client.init(opts()))
        .await
        .expect("second init must not hang");
    assert_eq!(res.unwrap_err().code(), ErrorCode::Timeout);
    assert!(matches!(client.state(), ClientState::Failed(_)));
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropped_init_then_ready_signal_reaches_ready() {
    let (connector, mut ports) = Scripted::new();
    let client = GlobalStorage::new(APP, connector).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), client.init(opts())).await;
    assert!(abandoned.is_err());
    let hub = ports.recv().await.unwrap();
    send_ready(&hub);

    client.init(opts()).await.unwrap();
    assert!(matches!(client.state(), ClientState::Ready));
}

#[tokio::test]
async fn hanging_connect_counts_against_init_deadline() {
    let client = GlobalStorage::new(APP, Arc::new(Stalled)).unwrap();
    let res = tokio::time::timeout(Duration::from_secs(3), client.init(opts()))
        .await
        .expect("init must honour its own deadline");
    assert_eq!(res.unwrap_err().code(), ErrorCode::Timeout);
    assert!(matches!(client.state(), ClientState::Failed(_)));
}

#[tokio::test]
async fn later_init_ignores_new_options() {
    let (connector, _) = embedded(".*");
    let client = ready_client(APP, connector, opts()).await;

    client.init(opts().with_allow("^other\\.net$")).await.unwrap();
    client.init(opts().with_url("not a url")).await.unwrap();
    client.init(opts().with_allow("([")).await.unwrap();
    assert!(matches!(client.state(), ClientState::Ready));
}

#[tokio::test]
async fn failed_client_reports_first_failure_whatever_the_options() {
    let (connector, _) = embedded("^other\\.net$");
    let client = GlobalStorage::new(APP, connector).unwrap();
    assert_eq!(client.init(opts()).await.unwrap_err().code(), ErrorCode::Transport);

    let err = client.init(opts().with_url("not a url")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Transport);
}

#[tokio::test]
async fn hub_refusing_parent_fails_init() {
    let (connector, _) = embedded("^other\\.net$");
    let client = GlobalStorage::new(APP, connector).unwrap();
    let err = client.init(opts()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Transport);
    assert!(matches!(client.state(), ClientState::Failed(_)));
}

// --------------------
// Correlation
// --------------------

#[tokio::test]
async fn request_carries_declared_pattern_and_fresh_ids() {
    let (client, mut hub) = scripted_ready().await;

    let script = async {
        let first = next_request(&mut hub).await;
        reply(&hub, &first.id, json!(1));
        let second = next_request(&mut hub).await;
        reply(&hub, &second.id, json!(2));
        (first, second)
    };
    let (a, b, (first, second)) = tokio::join!(
        async { client.set_item("x", 1).await },
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.get_item("x").await
        },
        script
    );
    assert_eq!(a.unwrap(), json!(1));
    assert_eq!(b.unwrap(), Some(json!(2)));

    assert_ne!(first.id, second.id);
    assert!(first.id.starts_with("global-storage-request:"));
    assert_eq!(first.allowed_origin.as_deref(), Some("^example\\.com$"));
    assert_eq!(first.value, Some(json!(1)));
    assert_eq!(second.value, None);
}

#[tokio::test]
async fn out_of_order_replies_resolve_the_right_callers() {
    let (client, mut hub) = scripted_ready().await;

    let script = async {
        let first = next_request(&mut hub).await;
        let second = next_request(&mut hub).await;
        let value_of = |r: &Request| json!(format!("value-of-{}", r.key));
        reply(&hub, &second.id, value_of(&second));
        reply(&hub, &first.id, value_of(&first));
    };
    let (a, b, ()) = tokio::join!(client.get_item("a"), client.get_item("b"), script);
    assert_eq!(a.unwrap(), Some(json!("value-of-a")));
    assert_eq!(b.unwrap(), Some(json!("value-of-b")));
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn timeout_then_late_reply_is_dropped() {
    let (client, mut hub) = scripted_ready().await;

    let (res, stale) = tokio::join!(client.get_item("slow"), next_request(&mut hub));
    assert_eq!(res.unwrap_err().code(), ErrorCode::Timeout);
    assert_eq!(client.pending(), 0);

    // late reply for the expired id, then a real one for the next request
    reply(&hub, &stale.id, json!("too late"));
    let script = async {
        let req = next_request(&mut hub).await;
        assert_ne!(req.id, stale.id);
        reply(&hub, &req.id, json!("fresh"));
    };
    let (res, ()) = tokio::join!(client.get_item("fast"), script);
    assert_eq!(res.unwrap(), Some(json!("fresh")));
}

#[tokio::test]
async fn hub_errors_keep_their_code() {
    let (client, mut hub) = scripted_ready().await;
    let script = async {
        let req = next_request(&mut hub).await;
        let err = globalstore_core::GlobalStoreError::KeyNotFound(req.key.clone());
        hub.post(serde_json::to_value(Reply::err(req.id, &err)).unwrap(), &TargetOrigin::Any)
            .unwrap();
    };
    let (res, ()) = tokio::join!(client.remove_item("gone"), script);
    assert_eq!(res.unwrap_err().code(), ErrorCode::KeyNotFound);
}

#[tokio::test]
async fn closed_link_fails_outstanding_requests_early() {
    let (client, mut hub) = scripted_ready_with(opts().with_timeout(Duration::from_secs(5))).await;

    let started = tokio::time::Instant::now();
    let script = async move {
        let _ = next_request(&mut hub).await;
        drop(hub);
    };
    let (res, ()) = tokio::join!(client.get_item("k"), script);
    assert_eq!(res.unwrap_err().code(), ErrorCode::Transport);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(client.pending(), 0);
}

// --------------------
// Against the real hub
// --------------------

#[tokio::test]
async fn unknown_key_is_none_and_round_trip_works() {
    let (connector, _) = embedded(".*");
    let client = ready_client(APP, connector, opts()).await;

    assert_eq!(client.get_item("never-set").await.unwrap(), None);

    let value = json!({ "user": "alice", "visits": 3 });
    assert_eq!(client.set_item("profile", &value).await.unwrap(), value);
    assert_eq!(client.get_item("profile").await.unwrap(), Some(value));

    #[derive(serde::Deserialize, PartialEq, Debug)]
    struct Profile {
        user: String,
        visits: u32,
    }
    let typed: Option<Profile> = client.get_item_as("profile").await.unwrap();
    assert_eq!(
        typed,
        Some(Profile {
            user: "alice".into(),
            visits: 3
        })
    );
}

#[tokio::test]
async fn remove_item_semantics() {
    let (connector, _) = embedded(".*");
    let client = ready_client(APP, connector, opts()).await;

    assert_eq!(client.remove_item("nope").await.unwrap_err().code(), ErrorCode::KeyNotFound);

    client.set_item("k", "v").await.unwrap();
    client.remove_item("k").await.unwrap();
    assert_eq!(client.get_item("k").await.unwrap(), None);
}

#[tokio::test]
async fn owner_lock_applies_across_clients() {
    let (connector, _) = embedded(".*");
    let owner = ready_client(APP, connector.clone(), opts()).await;
    let other = ready_client(OTHER, connector, opts()).await;

    owner.set_item("locked", "secret").await.unwrap();

    assert_eq!(other.get_item("locked").await.unwrap_err().code(), ErrorCode::RecordAccessDenied);
    assert_eq!(other.set_item("locked", "mine").await.unwrap_err().code(), ErrorCode::RecordAccessDenied);
    assert_eq!(other.remove_item("locked").await.unwrap_err().code(), ErrorCode::RecordAccessDenied);

    assert_eq!(owner.get_item("locked").await.unwrap(), Some(json!("secret")));
}

#[tokio::test]
async fn shared_pattern_grants_other_origin() {
    let (connector, _) = embedded(".*");
    let owner = ready_client(
        APP,
        connector.clone(),
        opts().with_allow("(example\\.com|other\\.net)$"),
    )
    .await;
    let other = ready_client(OTHER, connector, opts()).await;

    owner.set_item("shared", 42).await.unwrap();
    assert_eq!(other.get_item("shared").await.unwrap(), Some(json!(42)));
}

#[tokio::test]
async fn clear_removes_exactly_the_callers_records() {
    let (connector, store) = embedded(".*");
    let app = ready_client(APP, connector.clone(), opts()).await;
    let app_wide = ready_client(
        "https://www.example.com",
        connector.clone(),
        opts().with_allow("(example\\.com|other\\.net)$"),
    )
    .await;
    let other = ready_client(OTHER, connector, opts()).await;

    app.set_item("mine", 1).await.unwrap();
    app_wide.set_item("both", 2).await.unwrap();
    other.set_item("theirs", 3).await.unwrap();
    assert_eq!(store.len(), 3);

    other.clear().await.unwrap();

    assert!(store.contains_key("mine"));
    assert!(!store.contains_key("both"));
    assert!(!store.contains_key("theirs"));
    assert_eq!(app.get_item("mine").await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn hub_refusing_parent_fails_init_quickly() {
    let (connector, _) = embedded("example\\.com$");
    let insider = ready_client(APP, connector.clone(), opts()).await;
    insider.set_item("k", 1).await.unwrap();

    let outsider = GlobalStorage::new(OTHER, connector).unwrap();
    let started = tokio::time::Instant::now();
    let err = outsider
        .init(opts().with_timeout(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Transport);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn independent_clients_do_not_share_state() {
    let (connector, _) = embedded(".*");
    let ready = ready_client(APP, connector.clone(), opts()).await;
    let idle = GlobalStorage::new(APP, connector).unwrap();
    assert!(matches!(ready.state(), ClientState::Ready));
    assert_eq!(idle.get_item("k").await.unwrap_err().code(), ErrorCode::NotReady);
    assert_eq!(HUB, origin_of(&Url::parse(HUB_URL).unwrap()));
}
