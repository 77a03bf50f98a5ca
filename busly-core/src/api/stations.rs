//! Station catalogue endpoints.

use super::client::ApiClient;
use super::error::ApiError;
use crate::models::Station;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct StationService {
    client: Arc<ApiClient>,
}

impl StationService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Every station the backend knows about.
    pub async fn all_stations(&self) -> Result<Vec<Station>, ApiError> {
        let stations: Vec<Station> = self.client.get_json("/station").await?;
        debug!(count = stations.len(), "Fetched stations");
        Ok(stations)
    }

    pub async fn station(&self, station_id: &str) -> Result<Station, ApiError> {
        self.client
            .get_json(&format!("/stations/{station_id}"))
            .await
    }
}
