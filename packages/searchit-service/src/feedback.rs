use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, SearchItService};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLabel {
	Click,
	Relevant,
	NotRelevant,
	ThumbsUp,
	ThumbsDown,
}
impl FeedbackLabel {
	pub const ALL: [Self; 5] =
		[Self::Click, Self::Relevant, Self::NotRelevant, Self::ThumbsUp, Self::ThumbsDown];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Click => "click",
			Self::Relevant => "relevant",
			Self::NotRelevant => "not_relevant",
			Self::ThumbsUp => "thumbs_up",
			Self::ThumbsDown => "thumbs_down",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim();

		Self::ALL.into_iter().find(|label| label.as_str() == raw)
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedbackRequest {
	pub query: String,
	pub doc_id: String,
	pub chunk_id: String,
	/// Kept as text so an unknown label is reported as an invalid request.
	pub label: String,
	#[serde(default)]
	pub user_id: Option<String>,
}

/// Validated feedback handed to the configured sink.
#[derive(Clone, Debug, Serialize)]
pub struct FeedbackEvent {
	pub feedback_id: Uuid,
	pub query: String,
	pub doc_id: String,
	pub chunk_id: String,
	pub label: FeedbackLabel,
	pub user_id: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct FeedbackResponse {
	pub status: String,
	pub feedback_id: Uuid,
}

impl SearchItService {
	pub async fn feedback(&self, req: FeedbackRequest) -> Result<FeedbackResponse> {
		let event = feedback_event(req, OffsetDateTime::now_utc())?;

		self.feedback
			.submit(&event)
			.await
			.map_err(|err| Error::Feedback { message: err.to_string() })?;

		tracing::info!(
			feedback_id = %event.feedback_id,
			label = event.label.as_str(),
			"Feedback accepted."
		);

		Ok(FeedbackResponse { status: "accepted".to_string(), feedback_id: event.feedback_id })
	}
}

pub fn feedback_event(req: FeedbackRequest, now: OffsetDateTime) -> Result<FeedbackEvent> {
	let missing: Vec<String> = [
		("query", req.query.as_str()),
		("doc_id", req.doc_id.as_str()),
		("chunk_id", req.chunk_id.as_str()),
	]
	.into_iter()
	.filter(|(_, value)| value.trim().is_empty())
	.map(|(field, _)| field.to_string())
	.collect();

	if !missing.is_empty() {
		return Err(Error::InvalidRequest {
			message: format!("Missing required fields: {}.", missing.join(", ")),
			fields: missing,
		});
	}

	let Some(label) = FeedbackLabel::parse(&req.label) else {
		let allowed: Vec<&str> = FeedbackLabel::ALL.iter().map(|label| label.as_str()).collect();

		return Err(Error::invalid(
			format!("label must be one of: {}.", allowed.join(", ")),
			"label",
		));
	};
	let user_id = req.user_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());

	Ok(FeedbackEvent {
		feedback_id: Uuid::new_v4(),
		query: req.query.trim().to_string(),
		doc_id: req.doc_id.trim().to_string(),
		chunk_id: req.chunk_id.trim().to_string(),
		label,
		user_id,
		created_at: now,
	})
}
