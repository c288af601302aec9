use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::collect::global_variables::{
    ACTIVE_STATUS, API_KEY_HEADER, API_KEY_PARAM, BASE_URL, DEFAULT_LIMIT, DEFAULT_TIMEOUT,
    ENV_API_KEY, ENV_BASE_URL, ENV_TIMEOUT_SECS, OBSERVATION_COLLECTION, STATION_COLLECTION,
};
use crate::commons::acquisition_window::AcquisitionWindow;
use crate::error::{Result, SatlevelError};
use crate::geo_core::BoundingBox;

/// Connection settings for the observation service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Collections root, e.g. `https://dmigw.govcloud.dk/v2/oceanObs/collections`
    pub base_url: String,
    /// Sent as header and query parameter; omitted when empty
    pub api_key: String,
    pub timeout: Duration,
    /// `limit` sent with station and observation item requests
    pub limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            base_url: BASE_URL.to_string(),
            api_key: String::new(),
            timeout: DEFAULT_TIMEOUT,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `SATLEVEL_BASE_URL`, `SATLEVEL_API_KEY` and
    /// `SATLEVEL_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = ServiceConfig::default();

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Ok(api_key) = std::env::var(ENV_API_KEY) {
            config.api_key = api_key;
        }
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(
                    "Ignoring {}={:?}, not a number of seconds",
                    ENV_TIMEOUT_SECS, secs
                ),
            }
        }

        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// Read-only snapshot of a station record
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// One observed value at a station
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub observed_at: String,
    pub created_at: String,
    pub parameter_id: String,
    pub qc_status: String,
    pub value: f64,
    pub longitude: f64,
    pub latitude: f64,
}

/// `{"features": [...]}` body returned by every items endpoint
#[derive(Debug, Deserialize)]
struct ItemsResponse<P> {
    #[serde(default = "Vec::new")]
    features: Vec<Item<P>>,
}

#[derive(Debug, Deserialize)]
struct Item<P> {
    geometry: Option<PointGeometry>,
    properties: P,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    coordinates: Vec<f64>, // [lon, lat]
}

impl PointGeometry {
    fn lon_lat(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationProperties {
    station_id: String,
    name: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationProperties {
    station_id: Option<String>,
    observed: String,
    created: Option<String>,
    parameter_id: Option<String>,
    qc_status: Option<serde_json::Value>,
    value: Option<f64>,
}

/// Client for the station and observation collections.
/// Holds nothing beyond its configuration; every call is one blocking exchange
/// and nothing is retried.
pub struct StationQueryClient {
    config: ServiceConfig,
    client: Client,
}

impl StationQueryClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(StationQueryClient { config, client })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Fetch all available collections in the API
    pub fn list_collections(&self) -> Result<serde_json::Value> {
        let url = self.config.base_url.trim_end_matches('/').to_string();
        let response = self.authorized(self.client.get(&url)).send()?;
        Self::json_or_api_error(response)
    }

    /// Fetch one page of items from `collection` with extra query filters
    pub fn get_items(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        filters: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let mut params: Vec<(&str, String)> =
            vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        params.extend(filters.iter().cloned());
        self.get_collection(collection, &params)
    }

    /// Identifiers of the stations intersecting `bbox`, in service order
    pub fn list_station_ids(&self, bbox: &BoundingBox) -> Result<Vec<String>> {
        let params = [("bbox", bbox.to_query_param())];
        let document = self.get_collection(STATION_COLLECTION, &params)?;
        let response: ItemsResponse<StationProperties> = serde_json::from_value(document)?;

        Ok(response
            .features
            .into_iter()
            .map(|item| item.properties.station_id)
            .collect())
    }

    /// Stations with status "Active" intersecting `bbox`
    pub fn list_active_stations(&self, bbox: &BoundingBox) -> Result<Vec<Station>> {
        let filters = [
            ("status", ACTIVE_STATUS.to_string()),
            ("bbox", bbox.to_query_param()),
        ];
        let items: Vec<Item<StationProperties>> =
            self.fetch_items(STATION_COLLECTION, &filters)?;

        let mut stations = Vec::with_capacity(items.len());
        for item in items {
            let properties = item.properties;
            if properties
                .status
                .as_deref()
                .is_some_and(|status| status != ACTIVE_STATUS)
            {
                continue;
            }
            let Some((longitude, latitude)) = item.geometry.as_ref().and_then(|g| g.lon_lat())
            else {
                warn!("Station {} has no point geometry, skipped", properties.station_id);
                continue;
            };
            stations.push(Station {
                station_id: properties.station_id,
                name: properties.name.unwrap_or_else(|| "Unknown".to_string()),
                longitude,
                latitude,
            });
        }

        Ok(stations)
    }

    /// Observations of `station_id` within `window`; may be empty
    pub fn list_observations(
        &self,
        station_id: &str,
        window: &AcquisitionWindow,
    ) -> Result<Vec<Observation>> {
        let filters = [
            ("stationId", station_id.to_string()),
            ("datetime", window.to_string()),
        ];
        let items: Vec<Item<ObservationProperties>> =
            self.fetch_items(OBSERVATION_COLLECTION, &filters)?;

        let mut observations = Vec::with_capacity(items.len());
        for item in items {
            let properties = item.properties;
            let Some((longitude, latitude)) = item.geometry.as_ref().and_then(|g| g.lon_lat())
            else {
                warn!(
                    "Observation of station {} at {} has no point geometry, skipped",
                    station_id, properties.observed
                );
                continue;
            };
            observations.push(Observation {
                station_id: properties
                    .station_id
                    .unwrap_or_else(|| station_id.to_string()),
                observed_at: properties.observed,
                created_at: properties.created.unwrap_or_default(),
                parameter_id: properties
                    .parameter_id
                    .unwrap_or_else(|| "Unknown".to_string()),
                qc_status: properties.qc_status.map(qc_status_text).unwrap_or_default(),
                value: properties.value.unwrap_or(0.0),
                longitude,
                latitude,
            });
        }

        Ok(observations)
    }

    /// One request for the first `limit` items of `collection`
    fn fetch_items<P: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Item<P>>> {
        let document = self.get_items(collection, self.config.limit, 0, filters)?;
        let response: ItemsResponse<P> = serde_json::from_value(document)?;
        debug!("{}: received {} items", collection, response.features.len());

        if response.features.len() >= self.config.limit {
            warn!(
                "{}: response filled the limit of {} items, later items were not requested",
                collection, self.config.limit
            );
        }
        Ok(response.features)
    }

    fn get_collection(
        &self,
        collection: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}/{}/items",
            self.config.base_url.trim_end_matches('/'),
            collection
        );
        debug!("GET {} {:?}", url, params);

        let response = self
            .authorized(self.client.get(&url).query(params))
            .send()?;
        Self::json_or_api_error(response)
    }

    fn authorized(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        if self.config.api_key.is_empty() {
            return request;
        }
        request
            .header(API_KEY_HEADER, &self.config.api_key)
            .query(&[(API_KEY_PARAM, &self.config.api_key)])
    }

    fn json_or_api_error(response: Response) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SatlevelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

fn qc_status_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
