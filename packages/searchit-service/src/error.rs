pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String, fields: Vec<String> },
	#[error("All retrieval backends are unavailable.")]
	AllBackendsUnavailable,
	#[error("Feedback store error: {message}")]
	Feedback { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Pipeline error: {message}")]
	Pipeline { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into(), fields: vec![field.into()] }
	}
}

impl From<searchit_storage::Error> for Error {
	fn from(err: searchit_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<searchit_providers::Error> for Error {
	fn from(err: searchit_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<searchit_domain::grounding::InvalidTransition> for Error {
	fn from(err: searchit_domain::grounding::InvalidTransition) -> Self {
		Self::Pipeline { message: err.to_string() }
	}
}
