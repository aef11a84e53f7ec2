use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde::Serialize;

use crate::Result;

/// Forwards accepted feedback events to an external store over HTTP.
pub struct FeedbackStore {
	client: Client,
	endpoint: String,
	headers: HeaderMap,
}
impl FeedbackStore {
	pub fn new(endpoint: &str, cfg: &searchit_config::Feedback) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			endpoint: endpoint.to_string(),
			headers: crate::static_headers(&cfg.default_headers)?,
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub async fn send<T>(&self, event: &T) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		self.client
			.post(self.endpoint.as_str())
			.headers(self.headers.clone())
			.json(event)
			.send()
			.await?
			.error_for_status()?;

		Ok(())
	}
}
