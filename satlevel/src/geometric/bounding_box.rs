use log::info;
use std::path::Path;

use crate::error::{Result, SatlevelError};
use crate::geo_core::{BoundingBox, CoordinateTransformer, Crs};
use crate::geometric::source_reader::{GeospatialSourceReader, SourceKind};

/// Resolves an area of interest to a WGS84 bounding box.
///
/// Holds only reader settings, so one resolver can serve concurrent calls for different
/// paths.
#[derive(Debug, Clone, Default)]
pub struct BoundingBoxResolver {
    reader: GeospatialSourceReader,
}

impl BoundingBoxResolver {
    pub fn new(reader: GeospatialSourceReader) -> Self {
        BoundingBoxResolver { reader }
    }

    pub fn resolve(&self, path: &Path, kind: SourceKind) -> Result<BoundingBox> {
        match kind {
            SourceKind::Vector => self.from_vector(path),
            SourceKind::Raster => self.from_raster(path),
            SourceKind::SatelliteArchive => self.from_satellite_archive(path),
        }
    }

    /// Extent of the first layer, assumed to be geographic already
    pub fn from_vector(&self, path: &Path) -> Result<BoundingBox> {
        let bbox = self.reader.read_vector(path)?.extent;
        info!("Bounding box of {:?}: {}", path, bbox);
        Ok(bbox)
    }

    /// Extent of the raster, assumed to be geographic already
    pub fn from_raster(&self, path: &Path) -> Result<BoundingBox> {
        let bbox = self.reader.read_raster(path)?.extent;
        info!("Bounding box of {:?}: {}", path, bbox);
        Ok(bbox)
    }

    /// Projected extent of the reference band, reprojected to WGS84 as
    /// `(min_lon, min_lat, max_lon, max_lat)`
    pub fn from_satellite_archive(&self, path: &Path) -> Result<BoundingBox> {
        let source = self.reader.read_satellite_archive(path)?;
        let source_crs = source
            .crs
            .ok_or_else(|| SatlevelError::crs_detection(path, "reference band has no CRS"))?;

        let bbox = CoordinateTransformer::new(source_crs, Crs::WGS84)?
            .transform_bbox(&source.extent)?;
        info!(
            "Bounding box of {:?}: {} ({} extent {})",
            path, bbox, source_crs, source.extent
        );
        Ok(bbox)
    }
}

/// Bounding box of a vector file with the default reader
pub fn from_vector(path: impl AsRef<Path>) -> Result<BoundingBox> {
    BoundingBoxResolver::default().from_vector(path.as_ref())
}

/// Bounding box of a raster file with the default reader
pub fn from_raster(path: impl AsRef<Path>) -> Result<BoundingBox> {
    BoundingBoxResolver::default().from_raster(path.as_ref())
}

/// WGS84 bounding box of a zipped satellite product with the default reference band
pub fn from_satellite_archive(path: impl AsRef<Path>) -> Result<BoundingBox> {
    BoundingBoxResolver::default().from_satellite_archive(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::source_reader::tests::{write_band_archive, write_geotiff, write_zip};
    use crate::geometric::source_reader::ReferenceBand;
    use tempfile::TempDir;

    fn tif_resolver() -> BoundingBoxResolver {
        BoundingBoxResolver::new(
            GeospatialSourceReader::new().with_reference_band(ReferenceBand::new("_B04_10m", "tif")),
        )
    }

    #[test]
    fn test_from_satellite_archive_is_lon_lat() {
        let dir = TempDir::new().unwrap();
        let archive = write_band_archive(dir.path(), Some(32632));

        let bbox = tif_resolver().from_satellite_archive(&archive).unwrap();

        // Easting 600000 in zone 32N lies east of the 9°E central meridian, near 55.9°N
        assert!(bbox.is_valid());
        assert!(bbox.min_x > 10.0 && bbox.max_x < 11.0, "lon bounds {}", bbox);
        assert!(bbox.min_y > 55.0 && bbox.max_y < 57.0, "lat bounds {}", bbox);
        assert!(bbox.width() < 0.01 && bbox.height() < 0.01);
    }

    #[test]
    fn test_from_satellite_archive_matches_direct_transform() {
        let dir = TempDir::new().unwrap();
        let archive = write_band_archive(dir.path(), Some(32632));

        let bbox = tif_resolver()
            .resolve(&archive, SourceKind::SatelliteArchive)
            .unwrap();
        let expected = BoundingBox::new(600_000.0, 6_200_000.0, 600_040.0, 6_200_040.0)
            .transform(Crs::from_epsg(32632), Crs::WGS84)
            .unwrap();

        assert!((bbox.min_x - expected.min_x).abs() < 1e-9);
        assert!((bbox.min_y - expected.min_y).abs() < 1e-9);
        assert!((bbox.max_x - expected.max_x).abs() < 1e-9);
        assert!((bbox.max_y - expected.max_y).abs() < 1e-9);
    }

    #[test]
    fn test_from_satellite_archive_without_band() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("empty.SAFE.zip");
        write_zip(&archive, &[("empty.SAFE/manifest.safe", b"<xfdu/>".to_vec())]);

        assert!(matches!(
            from_satellite_archive(&archive),
            Err(SatlevelError::GranuleNotFound { .. })
        ));
    }

    #[test]
    fn test_from_raster_is_not_transformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aoi.tif");
        write_geotiff(&path, [8.0, 0.5, 0.0, 56.0, 0.0, -0.5], Some(4326));

        let bbox = from_raster(&path).unwrap();
        assert_eq!(bbox, BoundingBox::new(8.0, 54.0, 10.0, 56.0));
    }

    #[test]
    fn test_from_vector_missing_file() {
        assert!(matches!(
            from_vector("/nonexistent/test_aoi_2.shp"),
            Err(SatlevelError::SourceOpen { .. })
        ));
    }
}
