//! Shared fixtures for client scenarios.

use std::sync::Arc;

use quarry_client::{Client, ClientOptions};
use quarry_registry::{QueryDef, Registry, service};
use serde_json::{Value, json};
use tokio::sync::Notify;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// `user(id)` resolving to `{ "id": id, "name": "user <id>" }`, failing for id 2.
pub fn user_query() -> QueryDef {
	QueryDef::new(
		"user",
		service(|params| async move {
			match params.first().and_then(Value::as_i64) {
				Some(2) => Err(anyhow::anyhow!("user 2 not found")),
				Some(id) => Ok(json!({ "id": id, "name": format!("user {id}") })),
				None => Err(anyhow::anyhow!("missing id")),
			}
		}),
	)
}

/// Like [`user_query`], but each call waits for one `gate` permit before resolving.
pub fn gated_user_query(gate: Arc<Notify>) -> QueryDef {
	QueryDef::new(
		"user",
		service(move |params| {
			let gate = Arc::clone(&gate);
			async move {
				gate.notified().await;
				Ok::<_, anyhow::Error>(json!({ "id": params[0] }))
			}
		}),
	)
}

pub fn client_with(queries: Vec<QueryDef>) -> Client {
	init_tracing();
	let registry = Registry::new(queries, []).expect("valid registry");
	Client::new(registry, ClientOptions::default())
}
