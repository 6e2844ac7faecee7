//! JSON-RPC dispatcher over an injected registry.

use std::sync::Arc;

use liveboard_core::ParseError;
use liveboard_registry::{ActivityError, ActivityId, ActivityRegistry, ImageStore, StoreError};
use serde::de::DeserializeOwned;

use crate::params::{EndParams, RemoveImageParams, SaveImageParams, StartParams, UpdateParams};
use crate::rpc::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND, OPERATION_FAILED,
    PARSE_ERROR,
};

/// Method names accepted by [`ActivityBridge::handle_request`].
pub const METHODS: [&str; 8] = [
    "start",
    "update",
    "end",
    "list",
    "saveImage",
    "removeImage",
    "listImages",
    "cleanupImages",
];

/// Failure of a single method call.
#[derive(Debug)]
struct CallError {
    code: i32,
    kind: &'static str,
    message: String,
}

impl CallError {
    fn invalid_params(e: &serde_json::Error) -> Self {
        Self {
            code: INVALID_PARAMS,
            kind: "InvalidParams",
            message: format!("Invalid params: {e}"),
        }
    }

    fn images_unavailable() -> Self {
        Self {
            code: OPERATION_FAILED,
            kind: "ImagesUnavailable",
            message: "No image store configured".to_string(),
        }
    }
}

impl From<ActivityError> for CallError {
    fn from(e: ActivityError) -> Self {
        Self {
            code: OPERATION_FAILED,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<ParseError> for CallError {
    fn from(e: ParseError) -> Self {
        ActivityError::from(e).into()
    }
}

impl From<StoreError> for CallError {
    fn from(e: StoreError) -> Self {
        Self {
            code: OPERATION_FAILED,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

type CallResult = Result<serde_json::Value, CallError>;

/// Plugin boundary: forwards host calls to a registry and image store.
#[derive(Debug, Clone)]
pub struct ActivityBridge {
    registry: Arc<ActivityRegistry>,
    images: Option<Arc<ImageStore>>,
}

impl ActivityBridge {
    /// A bridge without image support.
    #[must_use]
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        Self {
            registry,
            images: None,
        }
    }

    /// Enable the image methods.
    #[must_use]
    pub fn with_images(mut self, images: Arc<ImageStore>) -> Self {
        self.images = Some(images);
        self
    }

    /// The injected registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    /// Handle a raw JSON-RPC message and serialize the response.
    pub async fn handle_message(&self, message: &str) -> String {
        let response = match serde_json::from_str::<JsonRpcRequest>(message) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => JsonRpcResponse::error(
                serde_json::Value::Null,
                PARSE_ERROR,
                "ParseError",
                format!("Invalid request: {e}"),
            ),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize response: {e}");
            String::new()
        })
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Bridge request: {}", request.method);

        let params = request.params;
        let result = match request.method.as_str() {
            "start" => self.call_start(params).await,
            "update" => self.call_update(params).await,
            "end" => self.call_end(params).await,
            "list" => self.call_list().await,
            "saveImage" => self.call_save_image(params),
            "removeImage" => self.call_remove_image(params),
            "listImages" => self.call_list_images(),
            "cleanupImages" => self.call_cleanup_images(),
            _ => {
                return JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    "MethodNotFound",
                    format!("Method not found: {}", request.method),
                )
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                tracing::warn!(
                    method = %request.method,
                    kind = e.kind,
                    "Bridge call failed: {}",
                    e.message
                );
                JsonRpcResponse::error(request.id, e.code, e.kind, e.message)
            }
        }
    }

    async fn call_start(&self, params: serde_json::Value) -> CallResult {
        let params: StartParams = parse_params(params)?;
        let request = params.into_request()?;
        let id = self.registry.start(request).await?;
        Ok(serde_json::json!({ "activityId": id }))
    }

    async fn call_update(&self, params: serde_json::Value) -> CallResult {
        let params: UpdateParams = parse_params(params)?;
        let id = ActivityId::from(params.activity_id);
        self.registry
            .update(&id, params.data, params.alert_configuration)
            .await?;
        Ok(serde_json::json!({}))
    }

    async fn call_end(&self, params: serde_json::Value) -> CallResult {
        let params: EndParams = parse_params(params)?;
        let id = ActivityId::from(params.activity_id);
        self.registry.end(&id, params.data).await?;
        Ok(serde_json::json!({}))
    }

    async fn call_list(&self) -> CallResult {
        let activities = self.registry.list().await?;
        Ok(serde_json::json!({ "activities": activities }))
    }

    fn call_save_image(&self, params: serde_json::Value) -> CallResult {
        let images = self.images()?;
        let params: SaveImageParams = parse_params(params)?;
        let outcome = images.save(&params.image_data, &params.name, params.quality)?;
        serde_json::to_value(outcome).map_err(|e| ActivityError::from(e).into())
    }

    fn call_remove_image(&self, params: serde_json::Value) -> CallResult {
        let images = self.images()?;
        let params: RemoveImageParams = parse_params(params)?;
        let removed = images.remove(&params.name)?;
        Ok(serde_json::json!({ "success": removed }))
    }

    fn call_list_images(&self) -> CallResult {
        let names = self.images()?.list()?;
        Ok(serde_json::json!({ "names": names }))
    }

    fn call_cleanup_images(&self) -> CallResult {
        let removed = self.images()?.cleanup()?;
        Ok(serde_json::json!({ "removed": removed }))
    }

    fn images(&self) -> Result<&ImageStore, CallError> {
        self.images
            .as_deref()
            .ok_or_else(CallError::images_unavailable)
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, CallError> {
    serde_json::from_value(params).map_err(|e| CallError::invalid_params(&e))
}
