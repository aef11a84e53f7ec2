use std::sync::Arc;

use searchit_service::SearchItService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SearchItService>,
}
impl AppState {
	pub fn new(config: searchit_config::Config) -> color_eyre::Result<Self> {
		let service = SearchItService::new(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: SearchItService) -> Self {
		Self { service: Arc::new(service) }
	}
}
