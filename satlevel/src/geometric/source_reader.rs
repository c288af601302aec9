use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess;
use gdal::Dataset;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

use crate::error::{Result, SatlevelError};
use crate::geo_core::{BoundingBox, Crs};

/// Kind of geospatial source an area of interest is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Any OGR-readable vector file; the first layer is used
    Vector,
    /// Any GDAL-readable raster file; its geotransform gives the extent
    Raster,
    /// Zip-compressed satellite product holding one raster file per band
    SatelliteArchive,
}

/// Raw extent of a source in its own CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceExtent {
    pub extent: BoundingBox,
    /// EPSG code of the source CRS, when the source declares one
    pub crs: Option<Crs>,
}

/// Band file whose geotransform and projection stand for the whole archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBand {
    /// Substring the band file name must contain
    pub token: String,
    /// File extension, compared case-insensitively
    pub extension: String,
}

impl ReferenceBand {
    pub fn new(token: impl Into<String>, extension: impl Into<String>) -> Self {
        ReferenceBand {
            token: token.into(),
            extension: extension.into(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let name_matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(&self.token));
        let extension_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension));
        name_matches && extension_matches
    }

    fn pattern(&self) -> String {
        format!("*{}*.{}", self.token, self.extension)
    }
}

impl Default for ReferenceBand {
    /// Sentinel-2 L2A red band at 10 m
    fn default() -> Self {
        ReferenceBand::new("_B04_10m", "jp2")
    }
}

/// Opens vector, raster and satellite-archive sources and reports their native extent.
/// No CRS transform happens here.
#[derive(Debug, Clone, Default)]
pub struct GeospatialSourceReader {
    reference_band: ReferenceBand,
    temp_root: Option<PathBuf>,
}

impl GeospatialSourceReader {
    pub fn new() -> Self {
        GeospatialSourceReader::default()
    }

    pub fn with_reference_band(mut self, reference_band: ReferenceBand) -> Self {
        self.reference_band = reference_band;
        self
    }

    /// Extract archives under `root` instead of the system temp directory
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn reference_band(&self) -> &ReferenceBand {
        &self.reference_band
    }

    pub fn read(&self, path: &Path, kind: SourceKind) -> Result<SourceExtent> {
        match kind {
            SourceKind::Vector => self.read_vector(path),
            SourceKind::Raster => self.read_raster(path),
            SourceKind::SatelliteArchive => self.read_satellite_archive(path),
        }
    }

    /// Extent of the first layer of a vector dataset
    pub fn read_vector(&self, path: &Path) -> Result<SourceExtent> {
        let dataset = open_dataset(path)?;
        if dataset.layer_count() == 0 {
            return Err(SatlevelError::source_open(path, "dataset has no layer"));
        }

        let layer = dataset
            .layer(0)
            .map_err(|e| SatlevelError::source_open(path, e))?;
        let envelope = layer
            .get_extent()
            .map_err(|e| SatlevelError::source_open(path, e))?;
        let extent =
            BoundingBox::from_envelope(envelope.MinX, envelope.MaxX, envelope.MinY, envelope.MaxY);
        let crs = layer.spatial_ref().and_then(|srs| epsg_of(srs).ok());

        debug!("Vector extent of {:?}: {} ({:?})", path, extent, crs);
        Ok(SourceExtent { extent, crs })
    }

    /// Extent of a raster dataset computed from its geotransform and size
    pub fn read_raster(&self, path: &Path) -> Result<SourceExtent> {
        let dataset = open_dataset(path)?;
        let extent = raster_extent(&dataset, path)?;
        let crs = dataset
            .spatial_ref()
            .ok()
            .and_then(|srs| epsg_of(srs).ok());

        debug!("Raster extent of {:?}: {} ({:?})", path, extent, crs);
        Ok(SourceExtent { extent, crs })
    }

    /// Extent and projected CRS of the reference band inside a zipped satellite product.
    ///
    /// The archive is extracted to a temporary directory that is removed on every exit
    /// path, including errors.
    pub fn read_satellite_archive(&self, archive: &Path) -> Result<SourceExtent> {
        let extraction = self.extract_archive(archive)?;
        debug!("Extracted {:?} to {:?}", archive, extraction.path());

        let result = match find_file(extraction.path(), &self.reference_band)? {
            Some(band_path) => {
                debug!("Reference band: {:?}", band_path);
                read_projected_band(&band_path)
            }
            None => Err(SatlevelError::GranuleNotFound {
                archive: archive.to_path_buf(),
                pattern: self.reference_band.pattern(),
            }),
        };

        // Every dataset opened on the extracted files is closed at this point
        drop(extraction);
        result
    }

    fn extract_archive(&self, archive: &Path) -> Result<TempDir> {
        let file = fs::File::open(archive).map_err(|e| SatlevelError::source_open(archive, e))?;
        let mut zip = ZipArchive::new(file).map_err(|e| SatlevelError::source_open(archive, e))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("satlevel_");
        let temp_dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                warn!("Skipping archive entry with unsafe path: {}", entry.name());
                continue;
            };
            let outpath = temp_dir.path().join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut outfile = fs::File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)?;
            }
        }

        Ok(temp_dir)
    }
}

/// Extent of a north-up raster from its geotransform
/// `[origin_x, pixel_width, rotation, origin_y, rotation, pixel_height]`.
/// Rotation terms are assumed to be zero.
pub fn extent_from_geotransform(geo_transform: &[f64; 6], width: usize, height: usize) -> BoundingBox {
    let origin_x = geo_transform[0];
    let origin_y = geo_transform[3];
    let far_x = origin_x + width as f64 * geo_transform[1];
    let far_y = origin_y + height as f64 * geo_transform[5];

    BoundingBox::from_corners((origin_x, origin_y), (far_x, far_y))
}

fn open_dataset(path: &Path) -> Result<Dataset> {
    Dataset::open(path).map_err(|e| SatlevelError::source_open(path, e))
}

fn raster_extent(dataset: &Dataset, path: &Path) -> Result<BoundingBox> {
    if dataset.raster_count() == 0 {
        return Err(SatlevelError::source_open(path, "dataset has no raster band"));
    }
    let geo_transform = dataset
        .geo_transform()
        .map_err(|e| SatlevelError::source_open(path, e))?;
    let (width, height) = dataset.raster_size();

    Ok(extent_from_geotransform(
        &geo_transform,
        width as usize,
        height as usize,
    ))
}

/// Open a band file and require a projected CRS with an EPSG code
fn read_projected_band(path: &Path) -> Result<SourceExtent> {
    let dataset = open_dataset(path)?;
    let extent = raster_extent(&dataset, path)?;

    let srs = dataset
        .spatial_ref()
        .map_err(|e| SatlevelError::crs_detection(path, format!("no projection: {}", e)))?;
    if !srs.is_projected() {
        return Err(SatlevelError::crs_detection(
            path,
            "projection is not a projected CRS",
        ));
    }
    let crs = epsg_of(srs).map_err(|reason| SatlevelError::crs_detection(path, reason))?;

    Ok(SourceExtent {
        extent,
        crs: Some(crs),
    })
}

fn epsg_of(mut srs: SpatialRef) -> std::result::Result<Crs, String> {
    if let Ok(code) = srs.auth_code() {
        return Ok(Crs::from_epsg(code as u32));
    }
    srs.auto_identify_epsg()
        .map_err(|e| format!("no EPSG code could be identified: {}", e))?;
    srs.auth_code()
        .map(|code| Crs::from_epsg(code as u32))
        .map_err(|e| format!("no EPSG code could be identified: {}", e))
}

/// Depth-first search for the first file matching `band`, visiting entries in name order
fn find_file(dir: &Path, band: &ReferenceBand) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_file(&path, band)? {
                return Ok(Some(found));
            }
        } else if band.matches(&path) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
