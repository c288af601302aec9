use anyhow::{Context, Result};
use satlevel::commons::basic_functions::output_folder_name;
use satlevel::geometric::bounding_box;
use satlevel::{AcquisitionWindow, ObservationPersistencePipeline, ServiceConfig, StationQueryClient};
use std::path::PathBuf;

/// Example: water levels around the acquisition of a Sentinel-2 product
/// Usage: water_level_from_satellite_image [product.SAFE.zip]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let file = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| {
        "data/S2B_MSIL2A_20240921T104629_N0511_R051_T32UMG_20240921T135519.SAFE.zip".to_string()
    }));
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .context("Archive path has no file name")?;

    let output_dir = file
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default()
        .join("output")
        .join(output_folder_name(&file));

    let bbox = bounding_box::from_satellite_archive(&file)?;
    println!("bbox = {}", bbox);

    let window = AcquisitionWindow::from_product_id(&file_name)?;
    println!("datetime_range = {}", window);

    let pipeline = ObservationPersistencePipeline::new(StationQueryClient::new(
        ServiceConfig::from_env(),
    )?);
    let summary = pipeline.run(bbox, window, &output_dir)?;

    println!(
        "{} station files written to {:?}",
        summary.written.len(),
        output_dir
    );
    Ok(())
}
