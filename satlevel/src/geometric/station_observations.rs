use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use log::{info, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::collect::ocean_obs::ocean_obs_collect::{Observation, Station, StationQueryClient};
use crate::commons::acquisition_window::AcquisitionWindow;
use crate::commons::basic_functions::truncate_to_width;
use crate::error::{Result, SatlevelError};
use crate::geo_core::BoundingBox;

/// Extension of every written feature collection
pub const OUTPUT_EXTENSION: &str = "geojson";

/// Attribute field of an output layer.
/// Text fields carry a `width` their values are cut to; numeric fields have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub width: Option<usize>,
}

impl FieldDef {
    const fn text(name: &'static str, width: usize) -> Self {
        FieldDef {
            name,
            width: Some(width),
        }
    }

    const fn real(name: &'static str) -> Self {
        FieldDef { name, width: None }
    }

    pub fn is_text(&self) -> bool {
        self.width.is_some()
    }

    fn set_text(&self, feature: &mut Feature, value: &str) {
        let value = match self.width {
            Some(width) => truncate_to_width(value, width),
            None => value.to_string(),
        };
        feature.set_property(self.name, value);
    }
}

const CREATED: FieldDef = FieldDef::text("created", 50);
const OBSERVED: FieldDef = FieldDef::text("observed", 50);
const PARAMETER_ID: FieldDef = FieldDef::text("parameterId", 50);
const QC_STATUS: FieldDef = FieldDef::text("qcStatus", 20);
const OBSERVATION_STATION_ID: FieldDef = FieldDef::text("stationId", 20);
const VALUE: FieldDef = FieldDef::real("value");

/// Fields of a per-station observation file
pub const OBSERVATION_FIELDS: [FieldDef; 6] = [
    CREATED,
    OBSERVED,
    PARAMETER_ID,
    QC_STATUS,
    OBSERVATION_STATION_ID,
    VALUE,
];

const STATION_ID: FieldDef = FieldDef::text("stationId", 50);
const STATION_NAME: FieldDef = FieldDef::text("name", 100);

/// Fields of the active-station layer
pub const STATION_FIELDS: [FieldDef; 2] = [STATION_ID, STATION_NAME];

/// What happens when fetching or writing one station fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Propagate the error and leave the remaining stations unprocessed
    #[default]
    Abort,
    /// Log the error, record the station as failed and go on with the next one
    SkipStation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationFailure {
    pub station_id: String,
    pub error: String,
}

/// Outcome of one pipeline run, in station order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// Stations without observations in the window
    pub empty_stations: Vec<String>,
    /// Only filled under `FailurePolicy::SkipStation`
    pub failed_stations: Vec<StationFailure>,
}

/// Fetches observations for every active station in an area and writes one
/// feature collection per station.
/// Stations are processed one after the other in the order the service returns them.
pub struct ObservationPersistencePipeline {
    client: StationQueryClient,
    failure_policy: FailurePolicy,
}

impl ObservationPersistencePipeline {
    pub fn new(client: StationQueryClient) -> Self {
        ObservationPersistencePipeline {
            client,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn client(&self) -> &StationQueryClient {
        &self.client
    }

    /// Retrieve and save observations for all active stations to station-specific files.
    ///
    /// Files written before an aborting error stay on disk.
    pub fn run(
        &self,
        bbox: BoundingBox,
        window: AcquisitionWindow,
        output_directory: &Path,
    ) -> Result<RunSummary> {
        fs::create_dir_all(output_directory)?;

        let stations = self.client.list_active_stations(&bbox)?;
        info!(
            "{} active stations in {}, window {}",
            stations.len(),
            bbox,
            window
        );

        let mut summary = RunSummary::default();
        for station in &stations {
            info!(
                "Fetching data for station {} ({})...",
                station.station_id, station.name
            );

            match self.persist_station(station, &window, output_directory) {
                Ok(Some(path)) => {
                    info!("Data for station {} saved to {:?}", station.station_id, path);
                    summary.written.push(path);
                }
                Ok(None) => {
                    info!(
                        "No observations found for station {} in the specified time window.",
                        station.station_id
                    );
                    summary.empty_stations.push(station.station_id.clone());
                }
                Err(err) => match self.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::SkipStation => {
                        warn!("Skipping station {}: {}", station.station_id, err);
                        summary.failed_stations.push(StationFailure {
                            station_id: station.station_id.clone(),
                            error: err.to_string(),
                        });
                    }
                },
            }
        }

        Ok(summary)
    }

    /// Save active stations within a bounding box to one point layer.
    /// Returns the number of stations written.
    pub fn save_stations(&self, bbox: BoundingBox, file_path: &Path) -> Result<usize> {
        let stations = self.client.list_active_stations(&bbox)?;
        let features = stations.iter().map(station_feature).collect();
        write_feature_collection(file_path, "active_stations", features)?;

        info!("{} active stations saved to {:?}", stations.len(), file_path);
        Ok(stations.len())
    }

    fn persist_station(
        &self,
        station: &Station,
        window: &AcquisitionWindow,
        output_directory: &Path,
    ) -> Result<Option<PathBuf>> {
        let file_path = station_file_path(output_directory, &station.station_id)?;
        let observations = self
            .client
            .list_observations(&station.station_id, window)?;
        if observations.is_empty() {
            return Ok(None);
        }

        let features = observations.iter().map(observation_feature).collect();
        write_feature_collection(&file_path, &station.station_id, features)?;
        Ok(Some(file_path))
    }
}

/// `<output_directory>/<station_id>.geojson`.
/// The id must be a single plain file name so the file stays inside `output_directory`.
pub fn station_file_path(output_directory: &Path, station_id: &str) -> Result<PathBuf> {
    let mut components = Path::new(station_id).components();
    let is_file_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == station_id
    );
    if !is_file_name || station_id.contains(['/', '\\']) {
        return Err(SatlevelError::InvalidStationId {
            station_id: station_id.to_string(),
        });
    }

    Ok(output_directory.join(format!("{}.{}", station_id, OUTPUT_EXTENSION)))
}

/// Map an observation to a point feature carrying `OBSERVATION_FIELDS`
pub fn observation_feature(observation: &Observation) -> Feature {
    let mut feature = point_feature(observation.longitude, observation.latitude);
    CREATED.set_text(&mut feature, &observation.created_at);
    OBSERVED.set_text(&mut feature, &observation.observed_at);
    PARAMETER_ID.set_text(&mut feature, &observation.parameter_id);
    QC_STATUS.set_text(&mut feature, &observation.qc_status);
    OBSERVATION_STATION_ID.set_text(&mut feature, &observation.station_id);
    feature.set_property(VALUE.name, observation.value);
    feature
}

pub fn station_feature(station: &Station) -> Feature {
    let mut feature = point_feature(station.longitude, station.latitude);
    STATION_ID.set_text(&mut feature, &station.station_id);
    STATION_NAME.set_text(&mut feature, &station.name);
    feature
}

fn point_feature(lon: f64, lat: f64) -> Feature {
    let mut feature = Feature::from(Geometry::new(Value::Point(vec![lon, lat])));
    feature.properties = Some(JsonObject::new());
    feature
}

/// Write `features` as a named feature collection, replacing any existing file
fn write_feature_collection(path: &Path, name: &str, features: Vec<Feature>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        "name".to_string(),
        serde_json::Value::String(name.to_string()),
    );
    let collection = GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    });

    let contents = serde_json::to_string_pretty(&collection)?;
    fs::write(path, contents).map_err(SatlevelError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::ocean_obs::ocean_obs_collect::ServiceConfig;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup_pipeline(server: &MockServer) -> ObservationPersistencePipeline {
        init();
        let client = StationQueryClient::new(ServiceConfig {
            base_url: server.base_url(),
            ..ServiceConfig::default()
        })
        .unwrap();
        ObservationPersistencePipeline::new(client)
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(8.0, 55.0, 9.0, 56.0)
    }

    fn window() -> AcquisitionWindow {
        AcquisitionWindow::parse("2018-02-12T00:00:00Z/2018-03-18T00:00:00Z").unwrap()
    }

    fn mock_stations(server: &MockServer, ids: &[&str]) {
        let features: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "geometry": {"type": "Point", "coordinates": [8.44, 55.46]},
                    "properties": {"stationId": id, "name": format!("Station {}", id), "status": "Active"}
                })
            })
            .collect();
        server.mock(|when, then| {
            when.method(GET)
                .path("/station/items")
                .query_param("status", "Active");
            then.status(200).json_body(json!({ "features": features }));
        });
    }

    fn mock_observations(server: &MockServer, station_id: &str, features: serde_json::Value) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/observation/items")
                .query_param("stationId", station_id);
            then.status(200).json_body(json!({ "features": features }));
        });
    }

    fn sea_level_observation(station_id: &str) -> serde_json::Value {
        json!([{
            "geometry": {"type": "Point", "coordinates": [8.4418, 55.4603]},
            "properties": {
                "created": "2018-02-12T00:10:00Z",
                "observed": "2018-02-12T00:00:00Z",
                "parameterId": "sea_reg",
                "qcStatus": "0",
                "stationId": station_id,
                "value": 1.23
            }
        }])
    }

    fn read_collection(path: &Path) -> FeatureCollection {
        let contents = fs::read_to_string(path).unwrap();
        match contents.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            other => panic!("expected a FeatureCollection, got {:?}", other),
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_no_active_stations() {
        let server = MockServer::start();
        mock_stations(&server, &[]);
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output").join("water_level");

        let summary = setup_pipeline(&server).run(bbox(), window(), &output).unwrap();

        assert!(output.is_dir());
        assert_eq!(file_count(&output), 0);
        assert!(summary.written.is_empty());
    }

    #[test]
    fn test_station_without_observations_is_skipped() {
        let server = MockServer::start();
        mock_stations(&server, &["25149"]);
        mock_observations(&server, "25149", json!([]));
        let dir = TempDir::new().unwrap();

        let summary = setup_pipeline(&server)
            .run(bbox(), window(), dir.path())
            .unwrap();

        assert_eq!(file_count(dir.path()), 0);
        assert_eq!(summary.empty_stations, vec!["25149".to_string()]);
    }

    #[test]
    fn test_one_station_one_observation() {
        let server = MockServer::start();
        mock_stations(&server, &["25149"]);
        mock_observations(&server, "25149", sea_level_observation("25149"));
        let dir = TempDir::new().unwrap();

        let summary = setup_pipeline(&server)
            .run(bbox(), window(), dir.path())
            .unwrap();

        let path = dir.path().join("25149.geojson");
        assert_eq!(summary.written, vec![path.clone()]);
        assert_eq!(file_count(dir.path()), 1);

        let collection = read_collection(&path);
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(feature.property("observed"), Some(&json!("2018-02-12T00:00:00Z")));
        assert_eq!(feature.property("created"), Some(&json!("2018-02-12T00:10:00Z")));
        assert_eq!(feature.property("parameterId"), Some(&json!("sea_reg")));
        assert_eq!(feature.property("stationId"), Some(&json!("25149")));
        assert_eq!(feature.property("qcStatus"), Some(&json!("0")));
        assert_eq!(feature.property("value"), Some(&json!(1.23)));
        assert_eq!(
            feature.geometry.as_ref().map(|g| g.value.clone()),
            Some(Value::Point(vec![8.4418, 55.4603]))
        );
        assert_eq!(
            collection.foreign_members.as_ref().and_then(|m| m.get("name")),
            Some(&json!("25149"))
        );
    }

    #[test]
    fn test_existing_file_is_overwritten() {
        let server = MockServer::start();
        mock_stations(&server, &["25149"]);
        mock_observations(&server, "25149", sea_level_observation("25149"));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("25149.geojson");
        fs::write(&path, "stale").unwrap();

        setup_pipeline(&server)
            .run(bbox(), window(), dir.path())
            .unwrap();

        assert_eq!(read_collection(&path).features.len(), 1);
    }

    #[test]
    fn test_api_error_aborts_run_and_keeps_partial_output() {
        let server = MockServer::start();
        mock_stations(&server, &["25149", "26359", "30336"]);
        mock_observations(&server, "25149", sea_level_observation("25149"));
        server.mock(|when, then| {
            when.method(GET)
                .path("/observation/items")
                .query_param("stationId", "26359");
            then.status(500).body("internal error");
        });
        let third = server.mock(|when, then| {
            when.method(GET)
                .path("/observation/items")
                .query_param("stationId", "30336");
            then.status(200).json_body(json!({"features": []}));
        });
        let dir = TempDir::new().unwrap();

        let result = setup_pipeline(&server).run(bbox(), window(), dir.path());

        assert!(matches!(result, Err(SatlevelError::Api { status: 500, .. })));
        assert!(dir.path().join("25149.geojson").exists());
        assert_eq!(third.hits(), 0);
    }

    #[test]
    fn test_skip_station_policy_continues() {
        let server = MockServer::start();
        mock_stations(&server, &["26359", "25149"]);
        server.mock(|when, then| {
            when.method(GET)
                .path("/observation/items")
                .query_param("stationId", "26359");
            then.status(502).body("bad gateway");
        });
        mock_observations(&server, "25149", sea_level_observation("25149"));
        let dir = TempDir::new().unwrap();

        let summary = setup_pipeline(&server)
            .with_failure_policy(FailurePolicy::SkipStation)
            .run(bbox(), window(), dir.path())
            .unwrap();

        assert_eq!(summary.written, vec![dir.path().join("25149.geojson")]);
        assert_eq!(summary.failed_stations.len(), 1);
        assert_eq!(summary.failed_stations[0].station_id, "26359");
    }

    #[test]
    fn test_station_listing_error_propagates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/station/items");
            then.status(403).body("forbidden");
        });
        let dir = TempDir::new().unwrap();

        let result = setup_pipeline(&server)
            .with_failure_policy(FailurePolicy::SkipStation)
            .run(bbox(), window(), dir.path());

        assert!(matches!(result, Err(SatlevelError::Api { status: 403, .. })));
    }

    #[test]
    fn test_save_stations() {
        let server = MockServer::start();
        mock_stations(&server, &["25149", "26359"]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output").join("test_aoi_2_active_stations.geojson");

        let count = setup_pipeline(&server).save_stations(bbox(), &path).unwrap();

        assert_eq!(count, 2);
        let collection = read_collection(&path);
        assert_eq!(collection.features.len(), 2);
        assert_eq!(
            collection.features[1].property("name"),
            Some(&json!("Station 26359"))
        );
    }

    #[test]
    fn test_station_file_path() {
        let dir = Path::new("output");
        assert_eq!(
            station_file_path(dir, "25149").unwrap(),
            dir.join("25149.geojson")
        );
        for station_id in ["../escaped", "a/b", "..", ".", "", "/tmp/x", "a\\b"] {
            assert!(
                matches!(
                    station_file_path(dir, station_id),
                    Err(SatlevelError::InvalidStationId { .. })
                ),
                "accepted {:?}",
                station_id
            );
        }
    }

    #[test]
    fn test_station_id_outside_output_directory_is_rejected() {
        let server = MockServer::start();
        mock_stations(&server, &["../escaped"]);
        let observations = server.mock(|when, then| {
            when.method(GET).path("/observation/items");
            then.status(200)
                .json_body(json!({ "features": sea_level_observation("../escaped") }));
        });
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output");

        let result = setup_pipeline(&server).run(bbox(), window(), &output);

        assert!(matches!(
            result,
            Err(SatlevelError::InvalidStationId { .. })
        ));
        assert_eq!(observations.hits(), 0);
        assert!(!dir.path().join("escaped.geojson").exists());
        assert_eq!(file_count(&output), 0);
    }

    #[test]
    fn test_skip_station_policy_records_invalid_station_id() {
        let server = MockServer::start();
        mock_stations(&server, &["../escaped", "25149"]);
        mock_observations(&server, "25149", sea_level_observation("25149"));
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("output");

        let summary = setup_pipeline(&server)
            .with_failure_policy(FailurePolicy::SkipStation)
            .run(bbox(), window(), &output)
            .unwrap();

        assert_eq!(summary.written, vec![output.join("25149.geojson")]);
        assert_eq!(summary.failed_stations.len(), 1);
        assert_eq!(summary.failed_stations[0].station_id, "../escaped");
        assert_eq!(file_count(dir.path()), 1);
    }

    #[test]
    fn test_observation_fields_are_truncated() {
        let observation = Observation {
            station_id: "123456789012345678901234".to_string(),
            observed_at: "2018-02-12T00:00:00Z".to_string(),
            created_at: String::new(),
            parameter_id: "sealev_dvr".to_string(),
            qc_status: "unchecked_but_plausible_value".to_string(),
            value: -0.4,
            longitude: 12.6,
            latitude: 55.7,
        };

        let feature = observation_feature(&observation);

        assert_eq!(
            feature.property("stationId"),
            Some(&json!("12345678901234567890"))
        );
        assert_eq!(
            feature.property("qcStatus"),
            Some(&json!("unchecked_but_plausi"))
        );
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties.len(), OBSERVATION_FIELDS.len());
        for field in OBSERVATION_FIELDS {
            let value = &properties[field.name];
            if field.is_text() {
                assert!(value.is_string(), "{} is {}", field.name, value);
            } else {
                assert_eq!(value.as_f64(), Some(-0.4), "{} is {}", field.name, value);
            }
        }
    }
}
