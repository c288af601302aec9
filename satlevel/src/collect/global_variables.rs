use std::path::PathBuf;
use std::time::Duration;

/// DMI oceanObs collections endpoint
pub const BASE_URL: &str = "https://dmigw.govcloud.dk/v2/oceanObs/collections";

/// Header carrying the API key (also accepted as the `api-key` query parameter)
pub const API_KEY_HEADER: &str = "X-Gravitee-Api-Key";
pub const API_KEY_PARAM: &str = "api-key";

pub const STATION_COLLECTION: &str = "station";
pub const OBSERVATION_COLLECTION: &str = "observation";

pub const ACTIVE_STATUS: &str = "Active";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LIMIT: usize = 10_000;

pub const ENV_BASE_URL: &str = "SATLEVEL_BASE_URL";
pub const ENV_API_KEY: &str = "SATLEVEL_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "SATLEVEL_TIMEOUT_SECS";

pub const TEMP_PATH: &str = "./temp";

pub fn get_temp_path() -> PathBuf {
    PathBuf::from(TEMP_PATH)
}
