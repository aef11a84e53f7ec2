use std::collections::{BTreeMap, HashMap};

use axum::{
	Json, Router,
	extract::{Query, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use searchit_domain::AbstainReason;
use searchit_service::{
	AskRequest, AskResponse, Error, FeedbackRequest, FeedbackResponse, SearchRequest,
	SearchResponse,
};

use crate::state::AppState;

const SERVICE_NAME: &str = "searchit-api";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/search", get(search))
		.route("/ask", post(ask))
		.route("/feedback", post(feedback))
		.with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
	service: &'static str,
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "healthy", service: SERVICE_NAME })
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SearchResponse>, ApiError> {
	let request = search_request(params)?;
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

async fn ask(
	State(state): State<AppState>,
	payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AskResponse>), ApiError> {
	let Json(payload) = payload?;
	let response = state.service.ask(payload).await?;
	let status = if response.reason == Some(AbstainReason::GenerationUnavailable) {
		StatusCode::SERVICE_UNAVAILABLE
	} else {
		StatusCode::OK
	};

	Ok((status, Json(response)))
}

async fn feedback(
	State(state): State<AppState>,
	payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.feedback(payload).await?;

	Ok(Json(response))
}

/// Builds a search request from raw query parameters.
///
/// Filters come from the legacy `filters=field:value,...` list and from every parameter other
/// than `q`, `top_k` and `with_highlights`. Individual parameters win over the legacy list.
pub fn search_request(mut params: HashMap<String, String>) -> Result<SearchRequest, ApiError> {
	let query = params.remove("q").unwrap_or_default();
	let top_k = match params.remove("top_k").filter(|raw| !raw.trim().is_empty()) {
		Some(raw) => Some(raw.trim().parse::<u32>().map_err(|_| {
			invalid_request("top_k must be a positive integer.", vec!["top_k".to_string()])
		})?),
		None => None,
	};
	let with_highlights = match params.remove("with_highlights") {
		Some(raw) => parse_flag(&raw).ok_or_else(|| {
			invalid_request(
				"with_highlights must be true or false.",
				vec!["with_highlights".to_string()],
			)
		})?,
		None => true,
	};
	let mut filters = match params.remove("filters") {
		Some(raw) => parse_legacy_filters(&raw)?,
		None => BTreeMap::new(),
	};

	filters.extend(params);

	Ok(SearchRequest { query, top_k, with_highlights, filters })
}

fn parse_flag(raw: &str) -> Option<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" => Some(true),
		"false" | "0" | "no" => Some(false),
		_ => None,
	}
}

fn parse_legacy_filters(raw: &str) -> Result<BTreeMap<String, String>, ApiError> {
	let mut out = BTreeMap::new();

	for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
		let Some((key, value)) = item.split_once(':') else {
			return Err(invalid_request(
				format!("Filter {item:?} must have the form field:value."),
				vec!["filters".to_string()],
			));
		};

		out.insert(key.trim().to_string(), value.trim().to_string());
	}

	Ok(out)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message, fields } => invalid_request(message, fields),
			Error::AllBackendsUnavailable => json_error(
				StatusCode::SERVICE_UNAVAILABLE,
				"ALL_BACKENDS_UNAVAILABLE",
				"All retrieval backends are unavailable.",
				None,
			),
			Error::Feedback { message } => {
				tracing::error!(error = %message, "Feedback hand-off failed.");

				json_error(StatusCode::BAD_GATEWAY, "FEEDBACK_UNAVAILABLE", message, None)
			},
			Error::Provider { message } => {
				tracing::error!(error = %message, "Provider error.");

				json_error(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message, None)
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage error.");

				json_error(StatusCode::BAD_GATEWAY, "STORAGE_ERROR", message, None)
			},
			Error::Pipeline { message } => {
				tracing::error!(error = %message, "Pipeline error.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"INTERNAL_ERROR",
					"Internal error.",
					None,
				)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		invalid_request(rejection.body_text(), Vec::new())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

fn invalid_request(message: impl Into<String>, fields: Vec<String>) -> ApiError {
	let fields = if fields.is_empty() { None } else { Some(fields) };

	json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, fields)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
		pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
	}

	#[test]
	fn merges_legacy_and_individual_filters() {
		let request = search_request(params(&[
			("q", "borrow"),
			("filters", "lang:en, tags:python"),
			("tags", "rust"),
		]))
		.expect("Expected a request.");

		assert_eq!(request.query, "borrow");
		assert_eq!(request.filters["lang"], "en");
		assert_eq!(request.filters["tags"], "rust");
		assert!(request.with_highlights);
		assert_eq!(request.top_k, None);
	}

	#[test]
	fn rejects_malformed_parameters() {
		assert!(search_request(params(&[("q", "x"), ("top_k", "ten")])).is_err());
		assert!(search_request(params(&[("q", "x"), ("with_highlights", "maybe")])).is_err());
		assert!(search_request(params(&[("q", "x"), ("filters", "lang")])).is_err());
	}

	#[test]
	fn parses_flags() {
		assert_eq!(parse_flag("FALSE"), Some(false));
		assert_eq!(parse_flag("1"), Some(true));
		assert_eq!(parse_flag(""), None);
	}
}
