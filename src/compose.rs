//! Cover composition
//!
//! A cover is the source image center-cropped to a fixed rectangle and pasted
//! onto a template. The original media file is never touched: covers are
//! separate artifacts persisted as `NN.cover.<ext>` next to `NN.<ext>`.
//!
//! Image work is CPU-bound and runs on the blocking pool.

use exif::{In, Tag};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ComposeError, Error, Result};
use crate::types::{MediaItem, MediaKind};

/// Rectangle on the template that receives the cropped source image
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CoverGeometry {
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
    /// Left offset on the template
    pub x: u32,
    /// Top offset on the template
    pub y: u32,
}

impl CoverGeometry {
    fn fits(&self, template_width: u32, template_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= template_width && b <= template_height)
    }
}

/// A decoded template and the format covers are written in
pub struct CoverTemplate {
    image: DynamicImage,
    format: ImageFormat,
}

impl CoverTemplate {
    /// Read and decode the template at `path`
    ///
    /// # Errors
    ///
    /// [`ComposeError::TemplateNotFound`] when the file does not exist,
    /// [`ComposeError::Decode`] when it is not a supported image.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ComposeError::TemplateNotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Err(e) => return Err(Error::storage(path, e)),
        };

        tokio::task::spawn_blocking(move || Self::from_bytes(&bytes))
            .await
            .map_err(|e| Error::Other(format!("template decode task failed: {e}")))?
    }

    /// Decode a template from memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decode_error = |e: image::ImageError| ComposeError::Decode {
            what: "template".to_string(),
            reason: e.to_string(),
        };
        let format = image::guess_format(bytes).map_err(decode_error)?;
        let image = image::load_from_memory_with_format(bytes, format).map_err(decode_error)?;
        Ok(Self { image, format })
    }

    /// Extension used for covers built on this template, e.g. "jpg"
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }

    /// Template dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// A composited cover, tied to the media item it was built from
#[derive(Clone, Debug)]
pub struct CoverArtifact {
    /// Index of the source media item
    pub index: usize,
    /// Extension of the encoded cover, mirrors the template format
    pub extension: String,
    /// Encoded image
    pub bytes: Vec<u8>,
}

impl CoverArtifact {
    /// Persisted file name, e.g. "01.cover.jpg"
    pub fn file_name(&self) -> String {
        format!("{:02}.cover.{}", self.index, self.extension)
    }
}

/// Builds covers for image items on a shared template
#[derive(Clone)]
pub struct CoverComposer {
    template: Arc<CoverTemplate>,
    geometry: CoverGeometry,
    jpeg_quality: u8,
}

impl CoverComposer {
    /// Create a composer, checking that `geometry` fits inside the template
    pub fn new(template: CoverTemplate, geometry: CoverGeometry, jpeg_quality: u8) -> Result<Self> {
        let (template_width, template_height) = template.dimensions();
        if !geometry.fits(template_width, template_height) {
            return Err(ComposeError::Geometry {
                width: geometry.width,
                height: geometry.height,
                x: geometry.x,
                y: geometry.y,
                template_width,
                template_height,
            }
            .into());
        }

        Ok(Self {
            template: Arc::new(template),
            geometry,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        })
    }

    /// Build the cover for `item`
    ///
    /// Returns `Ok(None)` for videos, which get no cover.
    pub async fn compose(&self, item: &MediaItem) -> Result<Option<CoverArtifact>> {
        if item.kind != MediaKind::Image {
            tracing::debug!(index = item.index, "Skipping cover for video item");
            return Ok(None);
        }

        let template = Arc::clone(&self.template);
        let geometry = self.geometry;
        let quality = self.jpeg_quality;
        let bytes = item.bytes.clone();
        let what = item.file_name();
        let index = item.index;

        let encoded = tokio::task::spawn_blocking(move || {
            compose(&bytes, &what, &template, geometry, quality)
        })
        .await
        .map_err(|e| Error::Other(format!("cover task failed: {e}")))??;

        Ok(Some(CoverArtifact {
            index,
            extension: self.template.extension().to_string(),
            bytes: encoded,
        }))
    }
}

/// Paste `image` onto `template` inside `geometry` and encode in the template's format
///
/// The source is rotated upright per its EXIF orientation, then scaled and
/// center-cropped so it fills the rectangle exactly. Any aspect ratio works.
pub fn compose(
    image: &[u8],
    what: &str,
    template: &CoverTemplate,
    geometry: CoverGeometry,
    jpeg_quality: u8,
) -> Result<Vec<u8>> {
    let source = image::load_from_memory(image).map_err(|e| ComposeError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })?;
    let source = correct_orientation(source, exif_orientation(image));
    let cropped = source.resize_to_fill(geometry.width, geometry.height, FilterType::Lanczos3);

    let mut canvas = template.image.clone();
    imageops::replace(&mut canvas, &cropped, i64::from(geometry.x), i64::from(geometry.y));

    encode(canvas, template.format, jpeg_quality)
}

fn encode(canvas: DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let (canvas, output) = match format {
        // The JPEG encoder has no alpha channel
        ImageFormat::Jpeg => (
            DynamicImage::ImageRgb8(canvas.to_rgb8()),
            ImageOutputFormat::Jpeg(jpeg_quality),
        ),
        other => (canvas, ImageOutputFormat::from(other)),
    };

    let mut out = Cursor::new(Vec::new());
    canvas
        .write_to(&mut out, output)
        .map_err(|e| ComposeError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// EXIF orientation tag, 1 when absent or unreadable
fn exif_orientation(bytes: &[u8]) -> u32 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn correct_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.fliph().rotate270(),
        6 => img.rotate90(),
        7 => img.fliph().rotate90(),
        8 => img.rotate270(),
        _ => img,
    }
}
