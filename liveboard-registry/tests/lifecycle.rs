//! End-to-end lifecycle tests against the in-memory platform.

use std::sync::Arc;

use async_trait::async_trait;
use liveboard_core::{
    Behavior, CompressionGate, DecodeError, DeflateCodec, DynamicIslandLayout, ExpandedRegions,
    GateConfig, Inflated, LayoutElement, SegmentCodec, Value, ValueMap, COMPRESSED_SENTINEL,
};
use liveboard_registry::{
    ActivityAttributes, ActivityError, ActivityId, ActivityPlatform, ActivityRegistry,
    ActivityRequest, ActivityState, AlertConfig, Availability, ContentState, DismissalPolicy,
    InMemoryPlatform, PlatformActivity, PlatformActivityState, PlatformError, PlatformHandle,
    RegistryConfig, RenderInput, StartRequest,
};

fn hello_request() -> StartRequest {
    StartRequest::new(
        LayoutElement::text("hello", "Hello"),
        DynamicIslandLayout::with_center(LayoutElement::text("hi", "Hi")),
        Behavior::new("myapp://home"),
    )
}

fn data(pairs: &[(&str, i32)]) -> ValueMap {
    pairs.iter().map(|(k, v)| (*k, Value::from(*v))).collect()
}

fn setup() -> (Arc<InMemoryPlatform>, ActivityRegistry) {
    let platform = Arc::new(InMemoryPlatform::new());
    let registry = ActivityRegistry::new(platform.clone());
    (platform, registry)
}

#[tokio::test]
async fn test_start_update_end_round_trip() {
    let (_, registry) = setup();

    let id = registry.start(hello_request()).await.expect("start");
    assert!(uuid_shaped(id.as_str()), "not a UUID: {id}");

    registry
        .update(&id, data(&[("x", 1)]), None)
        .await
        .expect("update");
    let listed = registry.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].state, ActivityState::Active);

    registry.end(&id, Some(ValueMap::new())).await.expect("end");
    let listed = registry.list().await.expect("list");
    assert!(listed.iter().all(|s| s.id != id));
}

#[tokio::test]
async fn test_missing_expanded_region_fails_before_platform_call() {
    let (platform, registry) = setup();
    let request = StartRequest {
        dynamic_island: DynamicIslandLayout {
            expanded: ExpandedRegions::default(),
            compact_leading: Some(LayoutElement::text("cl", "1")),
            ..DynamicIslandLayout::default()
        },
        ..hello_request()
    };

    let result = registry.start(request).await;

    assert!(matches!(result, Err(ActivityError::Validation(_))));
    assert_eq!(platform.calls().total(), 0);
}

#[tokio::test]
async fn test_invalid_behavior_fails_before_platform_call() {
    let (platform, registry) = setup();
    let request = StartRequest {
        behavior: Behavior::new("not a url"),
        ..hello_request()
    };

    let result = registry.start(request).await;

    assert!(matches!(result, Err(ActivityError::Validation(_))));
    assert_eq!(platform.calls().total(), 0);
}

#[tokio::test]
async fn test_unsupported_and_disabled_platforms() {
    let (platform, registry) = setup();

    platform.set_availability(Availability {
        supported: false,
        enabled: true,
    });
    let unsupported = registry.start(hello_request()).await;
    platform.set_availability(Availability {
        supported: true,
        enabled: false,
    });
    let disabled = registry.start(hello_request()).await;

    assert!(matches!(unsupported, Err(ActivityError::PlatformUnsupported)));
    assert!(matches!(disabled, Err(ActivityError::AuthorizationDenied)));
    assert_eq!(platform.calls().request, 0);
}

#[tokio::test]
async fn test_recovery_after_restart() {
    let platform = Arc::new(InMemoryPlatform::new());
    let attributes = ActivityAttributes {
        activity_id: "abc".to_string(),
        layout: r#"{"id":"root","kind":"text","properties":[{"text":"{{x}}"}]}"#.to_string(),
        dynamic_island_layout: "{}".to_string(),
        behavior: "{}".to_string(),
    };
    platform.seed(attributes, ContentState::default(), PlatformActivityState::Active);
    let registry = ActivityRegistry::new(platform.clone());

    registry
        .update(&ActivityId::from("abc"), data(&[("x", 1)]), None)
        .await
        .expect("update after recovery");

    let listed = registry.list().await.expect("list");
    assert!(listed.iter().any(|s| s.id.as_str() == "abc"));
    let record = registry.get(&ActivityId::from("abc")).await.expect("record");
    assert!(record.layout.is_some());
    assert_eq!(record.last_data, data(&[("x", 1)]));
}

#[tokio::test]
async fn test_recovery_is_idempotent() {
    let platform = Arc::new(InMemoryPlatform::new());
    for id in ["a", "b"] {
        platform.seed(
            ActivityAttributes {
                activity_id: id.to_string(),
                layout: "garbage".to_string(),
                dynamic_island_layout: String::new(),
                behavior: String::new(),
            },
            ContentState::default(),
            PlatformActivityState::Stale,
        );
    }
    let registry = ActivityRegistry::new(platform);

    let first = registry.recover().await.expect("recover");
    let second = registry.recover().await.expect("recover");

    assert_eq!(first.inserted.len(), 2);
    assert!(second.is_empty());
    let listed = registry.list().await.expect("list");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.state == ActivityState::Stale));
    // Undecodable layouts still recover
    let record = registry.get(&ActivityId::from("a")).await.expect("record");
    assert!(record.layout.is_none());
}

#[tokio::test]
async fn test_unknown_id_fails_after_sweep() {
    let (platform, registry) = setup();

    let update = registry
        .update(&ActivityId::from("nope"), ValueMap::new(), None)
        .await;
    let end = registry.end(&ActivityId::from("nope"), None).await;

    assert!(matches!(update, Err(ActivityError::ActivityNotFound(id)) if id == "nope"));
    assert!(matches!(end, Err(ActivityError::ActivityNotFound(_))));
    // One sweep per miss
    assert_eq!(platform.calls().activities, 2);
    assert_eq!(platform.calls().update, 0);
}

#[tokio::test]
async fn test_list_reports_platform_state() {
    let (platform, registry) = setup();
    let id = registry.start(hello_request()).await.expect("start");
    let handle = platform.surface_for(id.as_str()).expect("surface").handle;

    platform
        .set_state(&handle, PlatformActivityState::Dismissed)
        .expect("set state");
    let dismissed = registry.list().await.expect("list");
    platform
        .set_state(&handle, PlatformActivityState::Other("paused".to_string()))
        .expect("set state");
    let unknown = registry.list().await.expect("list");

    assert_eq!(dismissed[0].state, ActivityState::Dismissed);
    assert_eq!(unknown[0].state, ActivityState::Unknown);
}

#[tokio::test]
async fn test_alert_is_delivered_once() {
    let (platform, registry) = setup();
    let id = registry.start(hello_request()).await.expect("start");
    let alert = AlertConfig {
        title: "Delayed".to_string(),
        body: "Now arriving at 5pm".to_string(),
        sound: Some("chime.caf".to_string()),
    };

    registry
        .update(&id, data(&[("x", 1)]), Some(alert.clone()))
        .await
        .expect("update");
    registry
        .update(&id, data(&[("x", 2)]), None)
        .await
        .expect("update");

    let handle = platform.surface_for(id.as_str()).expect("surface").handle;
    assert_eq!(platform.alerts(&handle), vec![alert]);
}

#[tokio::test]
async fn test_end_immediate_removes_surface() {
    let (platform, registry) = setup();
    let id = registry.start(hello_request()).await.expect("start");

    registry
        .end_with_policy(&id, None, DismissalPolicy::Immediate)
        .await
        .expect("end");

    assert!(platform.surfaces().is_empty());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_platform_errors_propagate_unchanged() {
    let (platform, registry) = setup();
    platform.fail_next(
        liveboard_registry::platform::PlatformMethod::Request,
        PlatformError::Rejected("too many activities".to_string()),
    );

    let result = registry.start(hello_request()).await;

    assert!(matches!(
        result,
        Err(ActivityError::Platform(PlatformError::Rejected(msg))) if msg == "too many activities"
    ));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_oversized_payload_is_compressed_and_renderable() {
    let (platform, registry) = setup();
    let rows: Vec<LayoutElement> = (0..80)
        .map(|i| {
            LayoutElement::text(format!("row-{i}"), format!("{{{{row{i}}}}}"))
                .with_property("font", "headline")
                .with_property("color", "#336699")
        })
        .collect();
    let request = StartRequest {
        layout: LayoutElement::container("root", rows),
        ..hello_request()
    };

    let id = registry.start(request.clone()).await.expect("start");

    let surface = platform.surface_for(id.as_str()).expect("surface");
    assert!(surface.attributes.layout.starts_with(COMPRESSED_SENTINEL));
    assert!(surface.attributes.dynamic_island_layout.starts_with(COMPRESSED_SENTINEL));
    assert!(surface.attributes.behavior.starts_with(COMPRESSED_SENTINEL));

    let input = RenderInput::decode(&surface.attributes, registry.gate()).expect("decode");
    assert_eq!(input.layout, request.layout);
    assert_eq!(input.dynamic_island, request.dynamic_island);
    assert_eq!(input.behavior, request.behavior);
}

/// Deflate, except for inputs containing `FAIL`.
#[derive(Debug)]
struct FailingCodec;

impl SegmentCodec for FailingCodec {
    fn compress(&self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        if input.windows(4).any(|w| w == b"FAIL") {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected"));
        }
        DeflateCodec::default().compress(input)
    }

    fn inflate(&self, input: &[u8], capacity: usize) -> Result<Inflated, DecodeError> {
        DeflateCodec::default().inflate(input, capacity)
    }
}

fn failing_registry() -> (Arc<InMemoryPlatform>, ActivityRegistry) {
    let platform = Arc::new(InMemoryPlatform::new());
    let gate = CompressionGate::with_codec(
        GateConfig {
            ceiling_bytes: 100,
            ..GateConfig::default()
        },
        Arc::new(FailingCodec),
    );
    let registry = ActivityRegistry::new(platform.clone()).with_gate(gate);
    (platform, registry)
}

fn long_text(prefix: &str) -> String {
    format!("{prefix}{}", "abcdefghij".repeat(40))
}

#[tokio::test]
async fn test_layout_compression_failure_aborts_start() {
    let (platform, registry) = failing_registry();
    let request = StartRequest {
        layout: LayoutElement::text("root", long_text("FAIL")),
        ..hello_request()
    };

    let result = registry.start(request).await;

    assert!(matches!(result, Err(ActivityError::Compression(_))));
    assert_eq!(platform.calls().request, 0);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_behavior_compression_failure_sends_raw_segment() {
    let (platform, registry) = failing_registry();
    let request = StartRequest {
        layout: LayoutElement::text("root", long_text("")),
        behavior: Behavior::new("myapp://FAIL"),
        ..hello_request()
    };

    let id = registry.start(request.clone()).await.expect("start");

    let surface = platform.surface_for(id.as_str()).expect("surface");
    assert!(surface.attributes.layout.starts_with(COMPRESSED_SENTINEL));
    assert!(surface.attributes.dynamic_island_layout.starts_with(COMPRESSED_SENTINEL));
    assert!(!surface.attributes.behavior.starts_with(COMPRESSED_SENTINEL));

    let input = RenderInput::decode(&surface.attributes, registry.gate()).expect("decode");
    assert_eq!(input.layout, request.layout);
    assert_eq!(input.behavior, request.behavior);
}

#[tokio::test]
async fn test_small_payload_is_sent_raw() {
    let (platform, registry) = setup();

    let id = registry.start(hello_request()).await.expect("start");

    let surface = platform.surface_for(id.as_str()).expect("surface");
    assert!(!surface.attributes.layout.starts_with(COMPRESSED_SENTINEL));
    assert_eq!(
        surface.attributes.layout,
        hello_request().layout.to_json().expect("json")
    );
}

#[tokio::test]
async fn test_snapshots_follow_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = RegistryConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..RegistryConfig::default()
    };
    let registry = ActivityRegistry::with_config(Arc::new(InMemoryPlatform::new()), &config)
        .expect("registry");
    let snapshots = registry.snapshots().expect("snapshots enabled").clone();

    let id = registry
        .start(hello_request().with_data(data(&[("x", 1)])))
        .await
        .expect("start");
    registry
        .update(&id, data(&[("x", 7)]), None)
        .await
        .expect("update");
    let stored = snapshots.read(&id).expect("read").expect("present");
    assert_eq!(stored.data, data(&[("x", 7)]));

    registry.end(&id, None).await.expect("end");
    assert!(snapshots.read(&id).expect("read").is_none());
}

/// Platform that yields to the scheduler inside every call, widening the
/// window for interleaving.
struct YieldingPlatform(InMemoryPlatform);

#[async_trait]
impl ActivityPlatform for YieldingPlatform {
    fn availability(&self) -> Availability {
        self.0.availability()
    }

    async fn request(&self, request: ActivityRequest) -> Result<PlatformHandle, PlatformError> {
        tokio::task::yield_now().await;
        self.0.request(request).await
    }

    async fn update(
        &self,
        handle: &PlatformHandle,
        content: ContentState,
        alert: Option<AlertConfig>,
    ) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        self.0.update(handle, content, alert).await
    }

    async fn end(
        &self,
        handle: &PlatformHandle,
        content: Option<ContentState>,
        policy: DismissalPolicy,
    ) -> Result<(), PlatformError> {
        tokio::task::yield_now().await;
        self.0.end(handle, content, policy).await
    }

    async fn activities(&self) -> Result<Vec<PlatformActivity>, PlatformError> {
        tokio::task::yield_now().await;
        self.0.activities().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_update_and_end_never_interleave() {
    let registry = Arc::new(ActivityRegistry::new(Arc::new(YieldingPlatform(
        InMemoryPlatform::new(),
    ))));
    let id = registry.start(hello_request()).await.expect("start");

    let mut tasks = Vec::new();
    for i in 0..16 {
        let registry = Arc::clone(&registry);
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            if i == 8 {
                registry.end(&id, None).await
            } else {
                registry.update(&id, data(&[("x", i)]), None).await
            }
        }));
    }

    for task in tasks {
        match task.await.expect("join") {
            // An update queued behind the end sees the id gone; it never
            // reaches the platform with a stale handle.
            Ok(()) | Err(ActivityError::ActivityNotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(registry.get(&id).await.is_none());
}

fn uuid_shaped(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}
