//! Drive the bridge the way a host would: JSON in, JSON out.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use liveboard_bridge::{bridge_from_config, ActivityBridge, JsonRpcRequest, JsonRpcResponse};
use liveboard_registry::{ActivityId, ActivityRegistry, InMemoryPlatform, RegistryConfig};
use serde_json::json;

fn bridge() -> (Arc<InMemoryPlatform>, ActivityBridge) {
    let platform = Arc::new(InMemoryPlatform::new());
    let registry = ActivityRegistry::new(platform.clone());
    (platform, ActivityBridge::new(Arc::new(registry)))
}

async fn call(bridge: &ActivityBridge, method: &str, params: serde_json::Value) -> JsonRpcResponse {
    bridge
        .handle_request(JsonRpcRequest::new(1, method, params))
        .await
}

fn start_params() -> serde_json::Value {
    json!({
        "layout": {"id": "hello", "kind": "text", "properties": [{"text": "Hello"}]},
        "dynamicIslandLayout": {
            "expanded": {"center": {"id": "hi", "kind": "text", "properties": [{"text": "Hi"}]}}
        },
        "behavior": {"widgetUrl": "myapp://home"},
        "data": {}
    })
}

#[tokio::test]
async fn test_start_update_end_over_rpc() {
    let (_, bridge) = bridge();

    let started = call(&bridge, "start", start_params()).await;
    let id = started.result.expect("result")["activityId"]
        .as_str()
        .expect("activityId")
        .to_string();

    let updated = call(&bridge, "update", json!({"activityId": id, "data": {"x": 1}})).await;
    assert_eq!(updated.result, Some(json!({})));

    let listed = call(&bridge, "list", serde_json::Value::Null).await;
    assert_eq!(
        listed.result,
        Some(json!({"activities": [{"id": id, "state": "active"}]}))
    );

    let ended = call(&bridge, "end", json!({"activityId": id, "data": {}})).await;
    assert_eq!(ended.result, Some(json!({})));

    let listed = call(&bridge, "list", serde_json::Value::Null).await;
    assert_eq!(listed.result, Some(json!({"activities": []})));
}

#[tokio::test]
async fn test_layout_as_json_string() {
    let (platform, bridge) = bridge();
    let mut params = start_params();
    params["layout"] = json!(r#"{"id":"root","kind":"spacer"}"#);

    let response = call(&bridge, "start", params).await;

    assert!(!response.is_error(), "{:?}", response.error);
    assert_eq!(platform.calls().request, 1);
}

#[tokio::test]
async fn test_error_kinds() {
    let (platform, bridge) = bridge();

    let mut bad_kind = start_params();
    bad_kind["layout"] = json!({"id": "root", "kind": "hologram"});
    let mut no_region = start_params();
    no_region["dynamicIslandLayout"] = json!({"expanded": {}});
    let not_found = json!({"activityId": "missing", "data": {}});

    let parse = call(&bridge, "start", bad_kind).await.error.expect("error");
    let validation = call(&bridge, "start", no_region).await.error.expect("error");
    let missing = call(&bridge, "update", not_found).await.error.expect("error");

    assert_eq!((parse.code, parse.kind()), (-32000, Some("ParseError")));
    assert_eq!(
        (validation.code, validation.kind()),
        (-32000, Some("ValidationError"))
    );
    assert_eq!(
        (missing.code, missing.kind()),
        (-32000, Some("ActivityNotFound"))
    );
    assert_eq!(platform.calls().request, 0);
}

#[tokio::test]
async fn test_raw_message_round_trip() {
    let (_, bridge) = bridge();
    let message = json!({"jsonrpc": "2.0", "id": "req-1", "method": "list"}).to_string();

    let raw = bridge.handle_message(&message).await;

    let response: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(response["id"], "req-1");
    assert_eq!(response["result"], json!({"activities": []}));
}

#[tokio::test]
async fn test_object_keys_keep_document_order() {
    let (_, bridge) = bridge();
    let message = r#"{"jsonrpc":"2.0","id":7,"method":"start","params":{
        "layout":{"id":"card","kind":"text","properties":[{"shadow":{"z":1,"a":2}}]},
        "dynamicIslandLayout":{"expanded":{"center":{"id":"c","kind":"text"}}},
        "behavior":{"widgetUrl":"myapp://home"},
        "data":{"zeta":1,"alpha":2}}}"#;

    let raw = bridge.handle_message(message).await;
    let response: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let id = response["result"]["activityId"].as_str().expect("activityId");

    let record = bridge
        .registry()
        .get(&ActivityId::from(id))
        .await
        .expect("record");
    assert_eq!(record.last_data.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);
    let shadow = record
        .layout
        .as_ref()
        .and_then(|layout| layout.property("shadow"))
        .and_then(|value| value.as_object())
        .expect("shadow");
    assert_eq!(shadow.keys().collect::<Vec<_>>(), ["z", "a"]);
}

#[tokio::test]
async fn test_image_methods_with_configured_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = RegistryConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..RegistryConfig::default()
    };
    let bridge = bridge_from_config(Arc::new(InMemoryPlatform::new()), &config).expect("bridge");

    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([0, 128, 255]));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("png");
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);

    let saved = call(
        &bridge,
        "saveImage",
        json!({
            "imageData": format!("data:image/png;base64,{encoded}"),
            "name": "avatar",
            "quality": 0.9
        }),
    )
    .await;
    assert_eq!(
        saved.result,
        Some(json!({"success": true, "imageName": "avatar"}))
    );

    let listed = call(&bridge, "listImages", serde_json::Value::Null).await;
    assert_eq!(listed.result, Some(json!({"names": ["avatar"]})));

    let cleaned = call(&bridge, "cleanupImages", serde_json::Value::Null).await;
    assert_eq!(cleaned.result, Some(json!({"removed": 0})));

    let removed = call(&bridge, "removeImage", json!({"name": "avatar"})).await;
    assert_eq!(removed.result, Some(json!({"success": true})));

    let bad_params = json!({"imageData": "bm90IGFuIGltYWdl", "name": "x"});
    let bad = call(&bridge, "saveImage", bad_params).await;
    assert_eq!(bad.error.expect("error").kind(), Some("InvalidImage"));
}
