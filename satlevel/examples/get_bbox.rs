use anyhow::{Context, Result};
use satlevel::geometric::bounding_box::BoundingBoxResolver;
use satlevel::geometric::source_reader::SourceKind;
use std::path::PathBuf;

/// Example: bounding box of a vector, raster or zipped satellite product
/// Usage: get_bbox <path> [vector|raster|archive]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().unwrap_or_else(|| "data/test_aoi_1.shp".to_string()));
    let kind = match args.next().as_deref() {
        Some("raster") => SourceKind::Raster,
        Some("archive") => SourceKind::SatelliteArchive,
        _ => SourceKind::Vector,
    };

    let bbox = BoundingBoxResolver::default()
        .resolve(&path, kind)
        .with_context(|| format!("Failed to resolve bounding box of {:?}", path))?;

    println!("bbox = {}", bbox);
    Ok(())
}
