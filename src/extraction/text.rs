//! Text recovery from uploaded files.
//!
//! PDFs go through the embedded text layer first; scanned PDFs (image
//! XObjects, no fonts) and image files fall back to the `tesseract` CLI.
//! Anything that is already valid UTF-8 is taken as-is.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Below this many characters a PDF text layer is treated as absent.
const MIN_TEXT_CHARS: usize = 30;
/// Fraction of pages that must look scanned before OCR is preferred.
const SCANNED_PAGE_RATIO: f64 = 0.8;
/// Rasterize at most this many pages of a scanned PDF.
const MAX_OCR_PAGES: u32 = 3;
const OCR_TIMEOUT: Duration = Duration::from_secs(30);

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

pub async fn extract_text(bytes: &[u8], filename: &str) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if ext == "pdf" || bytes.starts_with(b"%PDF") {
        return extract_pdf_text(bytes).await;
    }
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return ocr_image(bytes, &ext).await;
    }

    // Plain text and unknown formats that happen to be valid UTF-8.
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => bail!("unsupported file format: {:?}", ext),
    }
}

async fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let owned = bytes.to_vec();
    let layer = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
        .await
        .context("text layer task panicked")?;

    if let Ok(text) = &layer {
        if text.trim().chars().count() >= MIN_TEXT_CHARS && !looks_like_scanned(bytes) {
            return Ok(text.clone());
        }
    }

    debug!("PDF text layer absent or scanned, running OCR");
    ocr_pdf(bytes).await
}

/// Heuristic for scanned PDFs: a page whose resources contain image
/// XObjects but no fonts is an image-only page.
fn looks_like_scanned(bytes: &[u8]) -> bool {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(d) => d,
        Err(_) => return false,
    };

    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut scanned = 0usize;
    for (_, page_id) in pages.iter() {
        let Ok((maybe_dict, _)) = doc.get_page_resources(*page_id) else {
            continue;
        };
        let Some(resources) = maybe_dict else { continue };
        let has_xobject = resources.get(b"XObject").is_ok();
        let has_font = resources.get(b"Font").is_ok();
        if has_xobject && !has_font {
            scanned += 1;
        }
    }

    scanned as f64 / pages.len() as f64 >= SCANNED_PAGE_RATIO
}

/// Rasterizes the first pages with `pdftoppm`, then OCRs each page.
async fn ocr_pdf(bytes: &[u8]) -> Result<String> {
    let dir = tempfile::tempdir().context("failed to create temp dir")?;
    let pdf_path = dir.path().join("input.pdf");
    tokio::fs::write(&pdf_path, bytes)
        .await
        .context("failed to write temp pdf")?;

    let prefix = dir.path().join("page");
    let status = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg("200")
        .arg("-f")
        .arg("1")
        .arg("-l")
        .arg(MAX_OCR_PAGES.to_string())
        .arg(&pdf_path)
        .arg(&prefix)
        .status()
        .await
        .context("failed to run pdftoppm")?;
    if !status.success() {
        bail!("pdftoppm exited with {}", status);
    }

    let mut combined = String::new();
    for page in 1..=MAX_OCR_PAGES {
        // pdftoppm names output page-1.png, page-2.png, ...
        let image = dir.path().join(format!("page-{}.png", page));
        if !image.exists() {
            break;
        }
        let text = run_tesseract(&image).await?;
        combined.push_str(&text);
        combined.push('\n');
    }
    Ok(combined)
}

async fn ocr_image(bytes: &[u8], ext: &str) -> Result<String> {
    let dir = tempfile::tempdir().context("failed to create temp dir")?;
    let path = dir.path().join(format!("input.{}", ext));
    tokio::fs::write(&path, bytes)
        .await
        .context("failed to write temp image")?;
    run_tesseract(&path).await
}

async fn run_tesseract(image: &Path) -> Result<String> {
    let output = tokio::time::timeout(
        OCR_TIMEOUT,
        Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .output(),
    )
    .await
    .context("tesseract timed out")?
    .context("failed to run tesseract")?;

    if !output.status.success() {
        bail!(
            "tesseract exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
