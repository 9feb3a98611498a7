//! Native GeoTIFF reading/writing for elevation tiles
//!
//! Uses the `tiff` crate directly; no GDAL dependency. Supports the
//! subset of GeoTIFF the elevation mosaics use: single-band north-up
//! grids georeferenced with `ModelPixelScaleTag`/`ModelTiepointTag`,
//! with an optional `GDAL_NODATA` sentinel.

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::Array2;
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Georeferencing metadata of a tile file, readable without decoding
/// the pixel data.
#[derive(Debug, Clone, Copy)]
pub struct RasterHeader {
    pub cols: usize,
    pub rows: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f32>,
}

impl RasterHeader {
    /// Bounding box (min_x, min_y, max_x, max_y) in projected coordinates.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }
}

/// Read only the georeferencing header of a GeoTIFF tile.
pub fn read_geotiff_header(path: impl AsRef<Path>) -> Result<RasterHeader> {
    let mut decoder = open_decoder(path.as_ref())?;
    read_header(&mut decoder)
}

/// Read a full GeoTIFF tile: pixel grid plus header.
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<(Array2<f32>, RasterHeader)> {
    let mut decoder = open_decoder(path.as_ref())?;
    let header = read_header(&mut decoder)?;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Tiff(format!("cannot read image data: {e}")))?;

    let data: Vec<f32> = match result {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U8(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U16(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U32(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I16(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I32(buf) => buf.iter().map(|&v| v as f32).collect(),
        _ => return Err(Error::Tiff("unsupported TIFF pixel format".into())),
    };

    if data.len() != header.rows * header.cols {
        return Err(Error::Tiff(format!(
            "pixel count {} does not match {}x{}",
            data.len(),
            header.rows,
            header.cols
        )));
    }

    let grid = Array2::from_shape_vec((header.rows, header.cols), data)
        .map_err(|e| Error::Tiff(e.to_string()))?;

    Ok((grid, header))
}

fn open_decoder(path: &Path) -> Result<Decoder<File>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(file)
        .map_err(|e| Error::Tiff(format!("{}: {e}", path.display())))?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

fn read_header(decoder: &mut Decoder<File>) -> Result<RasterHeader> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Tiff(format!("cannot read dimensions: {e}")))?;

    let transform = read_geotransform(decoder)?;
    let nodata = read_nodata(decoder);

    Ok(RasterHeader {
        cols: width as usize,
        rows: height as usize,
        transform,
        nodata,
    })
}

/// Read the GeoTransform from ModelPixelScaleTag + ModelTiepointTag.
fn read_geotransform(decoder: &mut Decoder<File>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Tiff("no ModelPixelScaleTag".into()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Tiff("no ModelTiepointTag".into()))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::Tiff("malformed georeferencing tags".into()));
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [sx, sy, sz]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// Read the GDAL_NODATA ASCII tag, if present and parseable.
fn read_nodata(decoder: &mut Decoder<File>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f32>().ok())
}

/// Write a single-band f32 grid as a GeoTIFF.
///
/// Kept minimal: pixel scale, tiepoint and a projected-model geokey
/// directory, enough for the tile index and common GIS tools to read
/// the file back. Used by tests to build fixture mosaics.
pub fn write_geotiff(
    path: impl AsRef<Path>,
    data: &Array2<f32>,
    transform: &GeoTransform,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Tiff(format!("encoder: {e}")))?;

    let (rows, cols) = data.dim();
    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Tiff(format!("cannot create image: {e}")))?;

    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Tiff(format!("cannot write scale tag: {e}")))?;

    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Tiff(format!("cannot write tiepoint tag: {e}")))?;

    // GTModelTypeGeoKey = Projected, GTRasterTypeGeoKey = PixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    image
        .encoder()
        .write_tag(Tag::Unknown(34735), &geokeys[..])
        .map_err(|e| Error::Tiff(format!("cannot write geokey tag: {e}")))?;

    let flat: Vec<f32> = data.iter().copied().collect();
    image
        .write_data(&flat)
        .map_err(|e| Error::Tiff(format!("cannot write image data: {e}")))?;

    Ok(())
}
