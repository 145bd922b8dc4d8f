//! PDF rasterisation: turn every page into an encoded page image.
//!
//! Rasterisation sits behind the [`Rasterizer`] trait so the pipeline can be
//! driven by anything that yields ordered page images. The production
//! implementation, [`PdfiumRasterizer`], wraps the pdfium C++ library, which
//! keeps thread-local state and must not run on Tokio worker threads; all of
//! its work happens inside `spawn_blocking`.
//!
//! Any failure here aborts the whole document: there is no partial
//! rasterisation and nothing is cached.

use crate::config::ExtractionConfig;
use crate::engine;
use crate::error::PdfChatError;
use crate::pipeline::encode;
use async_trait::async_trait;
use edgequake_llm::ImageData;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// One rasterised page, ready to be sent to the model.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_num: usize,
    /// Base64 PNG of the page.
    pub image: ImageData,
}

/// Converts a PDF on disk into its page images, in page order.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, PdfChatError>;
}

/// [`Rasterizer`] backed by pdfium.
///
/// The library comes from [`crate::engine`]: `PDFIUM_LIB_PATH`, the local
/// cache, or a one-time download.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32, password: Option<String>) -> Self {
        Self {
            max_rendered_pixels,
            password,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.max_rendered_pixels, config.password.clone())
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, PdfChatError> {
        let path = pdf_path.to_path_buf();
        let max_pixels = self.max_rendered_pixels;
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&path, max_pixels, password.as_deref())
        })
        .await
        .map_err(|e| PdfChatError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind pdfium from the provisioned library, falling back to a system-wide
/// install when provisioning fails.
fn bind_pdfium() -> Result<Pdfium, PdfChatError> {
    let bindings = match engine::ensure_library(None) {
        Ok(path) => Pdfium::bind_to_library(&path).map_err(|e| {
            PdfChatError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e))
        })?,
        Err(engine_err) => {
            warn!("pdfium provisioning failed ({}), trying system library", engine_err);
            Pdfium::bind_to_system_library().map_err(|_| engine_err)?
        }
    };

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<PageImage>, PdfChatError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                PdfChatError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                PdfChatError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            PdfChatError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            PdfChatError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let encoded =
            encode::encode_page(&image).map_err(|e| PdfChatError::RasterisationFailed {
                page: page_num,
                detail: format!("Image encoding failed: {}", e),
            })?;

        results.push(PageImage {
            page_num,
            image: encoded,
        });
    }

    Ok(results)
}
