//! Page rasterisation: render every page of a PDF to a `DynamicImage`.
//!
//! The [`Rasterizer`] trait is synchronous because pdfium is not safe to
//! drive from async contexts; [`render_pages`] moves the work onto tokio's
//! blocking pool. Page order is preserved: the returned vector is indexed by
//! page, 0-based.

use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// One rasterised page. Owned by a single extraction call.
pub struct PageImage {
    /// 0-based page index.
    pub index: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    /// 1-indexed page number, for messages and results.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("index", &self.index)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Turns a document payload into one image per page, in page order.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, document: &Document) -> Result<Vec<PageImage>, ExtractionError>;
}

/// Rasterise on the blocking pool.
pub async fn render_pages(
    rasterizer: Arc<dyn Rasterizer>,
    document: Document,
) -> Result<Vec<PageImage>, ExtractionError> {
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&document))
        .await
        .map_err(|e| ExtractionError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed rasteriser.
///
/// A fresh `Pdfium` binding is created per call: the handle is `!Send`, and
/// the OS caches the dynamic library so re-binding is cheap.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32) -> Self {
        Self {
            dpi,
            max_pixels,
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.dpi, config.max_rendered_pixels)
    }

    /// Use this pdfium library instead of searching for one.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Locate and bind the pdfium library.
    ///
    /// Discovery order: explicit path (`PDFIUM_LIB_PATH`), next to the running
    /// executable, then the system library search path.
    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        if let Some(ref path) = self.library_path {
            debug!("Binding pdfium from {}", path.display());
            let bindings = Pdfium::bind_to_library(path).map_err(|e| {
                ExtractionError::PdfiumUnavailable(format!("{}: {:?}", path.display(), e))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!("Bound pdfium next to executable in {}", exe_dir.display());
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, document: &Document) -> Result<Vec<PageImage>, ExtractionError> {
        let pdfium = self.bind()?;

        let pdf = pdfium
            .load_pdf_from_byte_slice(document.bytes(), document.password())
            .map_err(|e| map_load_error(&format!("{:?}", e), document.password().is_some()))?;

        let pages = pdf.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);
        if total_pages == 0 {
            return Err(ExtractionError::NoPages);
        }

        let mut results = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            let (width, height) =
                compute_render_dimensions(page.width().value, page.height().value, self.dpi, self.max_pixels);

            let render_config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ExtractionError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(PageImage::new(idx, image));
        }

        Ok(results)
    }
}

/// Classify a pdfium load failure.
fn map_load_error(detail: &str, password_given: bool) -> ExtractionError {
    let lower = detail.to_lowercase();
    if lower.contains("password") {
        if password_given {
            ExtractionError::WrongPassword
        } else {
            ExtractionError::PasswordRequired
        }
    } else {
        ExtractionError::CorruptDocument {
            detail: detail.to_string(),
        }
    }
}

/// Pixel dimensions for a page rendered at `dpi`, with the longest edge
/// capped at `max_pixels` and the aspect ratio preserved.
pub fn compute_render_dimensions(
    width_points: f32,
    height_points: f32,
    dpi: u32,
    max_pixels: u32,
) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let longest = raw_w.max(raw_h);
    if longest > max_pixels as f32 {
        let ratio = max_pixels as f32 / longest;
        let w = ((raw_w * ratio) as u32).clamp(1, max_pixels);
        let h = ((raw_h * ratio) as u32).clamp(1, max_pixels);
        warn!(
            "Page of {}x{} px capped to {}x{} px",
            raw_w as u32, raw_h as u32, w, h
        );
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}
