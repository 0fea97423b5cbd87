/// Misuse of the client surface. The offending call is refused and nothing is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
	#[error("no query registered as {name:?}")]
	UnknownQuery { name: String },
	#[error("no mutation registered as {name:?}")]
	UnknownMutation { name: String },
	#[error("no query or mutation registered as {name:?}")]
	UnknownService { name: String },
	#[error("parameters for {name:?} must be a list, got {got}")]
	ParamsNotSequence { name: String, got: &'static str },
	#[error("batch for {query:?} has {params} parameter sets for {requests} requests")]
	BatchArity { query: String, requests: usize, params: usize },
	#[error("handles for {name:?} spawn their requests, but no Tokio runtime is running")]
	NoRuntime { name: String },
}

impl UsageError {
	/// Logs the error at `error` level and hands it back.
	pub(crate) fn logged(self) -> Self {
		tracing::error!(error = %self, "client.usage");
		self
	}
}
