use anyhow::{Context, Result};
use satlevel::geometric::bounding_box;
use satlevel::{ServiceConfig, StationQueryClient};

/// Example: identifiers of the stations inside the extent of a vector file
/// Usage: get_station_ids [vector_path]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/test_aoi_2.shp".to_string());
    let bbox = bounding_box::from_vector(&path)?;

    let client = StationQueryClient::new(ServiceConfig::from_env())?;
    let station_ids = client
        .list_station_ids(&bbox)
        .context("Failed to list station ids")?;

    println!("station_ids = {:?}", station_ids);
    Ok(())
}
