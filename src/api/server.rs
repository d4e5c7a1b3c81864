//! API Server Module
//!
//! This module implements a JSON-RPC server standing in for a bot transport.
//! Each submitted item is routed through the dispatcher and the HTTP call stays
//! open until that item's continuation has run, or until the item is absorbed
//! into a later one of its group.

use crate::{
    config::Config,
    consumer::{BatchConsumer, DeliveryReport},
    dispatch::{Dispatcher, Route},
    Item, ItemError,
};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Shared application state that is accessible across all request handlers
///
/// - `dispatcher`: Routes items to the aggregator or straight downstream
/// - `consumer`: Downstream handler run by each item's continuation
#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
    consumer: BatchConsumer,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, consumer: BatchConsumer) -> Self {
        Self {
            dispatcher,
            consumer,
        }
    }
}

/// The main API server struct
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Server configuration (host, port, etc.)
    /// * `dispatcher` - Dispatcher wired to the shared aggregator
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        let state = AppState::new(dispatcher, BatchConsumer::new());
        Self { config, state }
    }

    /// Starts the API server and begins listening for incoming requests
    ///
    /// # Returns
    /// `Ok(())` if the server runs to completion, or an error if binding fails
    pub async fn start(self) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state);

        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` will be populated, but not both.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

/// JSON-RPC error object
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Main RPC request handler
///
/// Routes the request to the appropriate handler based on the method name.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    debug!("Received RPC request: {}", request.method);

    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::failure(
            request.id,
            -32600, // Invalid request
            "Unsupported jsonrpc version",
        ));
    }

    match request.method.as_str() {
        "submitItem" => handle_submit_item(state, request).await,
        "pendingGroups" => {
            let pending = state.dispatcher.aggregator().pending_groups();
            Json(JsonRpcResponse::success(
                request.id,
                json!({ "pending_groups": pending }),
            ))
        }
        _ => Json(JsonRpcResponse::failure(
            request.id,
            -32601, // Method not found
            "Method not found",
        )),
    }
}

/// Handles the "submitItem" RPC method
///
/// 1. Decodes the item from the request parameters
/// 2. Dispatches it with a continuation that runs the consumer
/// 3. Waits for the continuation; a dropped continuation means the item was
///    absorbed into a later item's batch
async fn handle_submit_item(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let item = match decode_item(request.params) {
        Ok(item) => item,
        Err(e) => {
            warn!("Rejected item: {}", e);
            return Json(JsonRpcResponse::failure(
                request.id,
                -32602, // Invalid params
                e.to_string(),
            ));
        }
    };

    let sequence = item.sequence;
    let (tx, rx) = oneshot::channel::<DeliveryReport>();
    let consumer = state.consumer.clone();

    let route = state.dispatcher.dispatch(
        item,
        Box::new(move |delivery| {
            let _ = tx.send(consumer.handle(&delivery));
        }),
    );
    if route == Route::Aggregated {
        debug!("Item #{} waiting for its group to settle", sequence);
    }

    let result = match rx.await {
        Ok(report) => json!(report),
        Err(_) => {
            debug!("Item #{} absorbed into a later delivery", sequence);
            json!({ "status": "absorbed" })
        }
    };

    Json(JsonRpcResponse::success(request.id, result))
}

fn decode_item(params: Value) -> Result<Item, ItemError> {
    Ok(serde_json::from_value(params)?)
}
