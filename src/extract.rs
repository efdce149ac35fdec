//! Artifact extraction: pure transformations from a settled page into the
//! typed outputs a render can produce (HTML, plain text, screenshot, PDF).

use crate::behavior::InteractionSimulator;
use crate::config::ImageFormat;
use crate::error::RenderError;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use std::time::Duration;

pub struct ArtifactExtractors;

impl ArtifactExtractors {
    pub async fn html(page: &Page) -> Result<String, RenderError> {
        page.content()
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))
    }

    /// DOM-traversal plain-text extraction: strips script/style/nav/aside
    /// and ad-class-matching elements, normalises whitespace, keeps reading
    /// order.
    pub async fn plain_text(page: &Page) -> Result<String, RenderError> {
        let script = r#"(function() {
            const clone = document.body ? document.body.cloneNode(true) : document.createElement('body');
            const removable = clone.querySelectorAll(
                'script, style, nav, aside, noscript, [class*="ad-"], [class*="advert"], [id*="ad-"]'
            );
            removable.forEach((el) => el.remove());
            const text = clone.innerText || clone.textContent || '';
            return text.replace(/[ \t]+/g, ' ').replace(/\n{3,}/g, '\n\n').trim();
        })()"#;

        page.evaluate(script)
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))?
            .into_value()
            .map_err(|e| RenderError::extraction_error(e.to_string()))
    }

    pub async fn screenshot(
        page: &Page,
        full_page: bool,
        format: ImageFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, RenderError> {
        let cdp_format = match format {
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };

        let mut builder = ScreenshotParams::builder().format(cdp_format).full_page(full_page);
        if let (ImageFormat::Jpeg, Some(q)) = (format, quality) {
            builder = builder.quality(q as i64);
        }

        let png_data = page
            .screenshot(builder.build())
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))?;

        reencode(png_data, format)
    }

    pub async fn screenshot_element(
        page: &Page,
        selector: &str,
        format: ImageFormat,
    ) -> Result<Vec<u8>, RenderError> {
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))?;

        let cdp_format = match format {
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
        };

        let png_data = element
            .screenshot(cdp_format)
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))?;

        reencode(png_data, format)
    }

    /// PDF emission prefers a fresh navigation path over the already-settled
    /// page used for HTML/screenshot: it reloads `url` with a network-idle
    /// wait and explicit stylesheet/image settling, since print layout can
    /// differ from what's already stabilised on screen (§4.5).
    pub async fn pdf(
        page: &Page,
        url: &str,
        background: bool,
        margins_inches: Option<(f64, f64, f64, f64)>,
    ) -> Result<Vec<u8>, RenderError> {
        page.goto(url).await.map_err(|e| RenderError::extraction_error(e.to_string()))?;
        page.wait_for_navigation().await.map_err(|e| RenderError::extraction_error(e.to_string()))?;
        InteractionSimulator::wait_for_stylesheets_and_images(page).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut builder = PrintToPdfParams::builder()
            .print_background(background)
            .scale(1.0);

        if let Some((top, bottom, left, right)) = margins_inches {
            builder = builder.margin_top(top).margin_bottom(bottom).margin_left(left).margin_right(right);
        }

        let params = builder.build();

        page.pdf(params)
            .await
            .map_err(|e| RenderError::extraction_error(e.to_string()))
    }
}

fn reencode(png_data: Vec<u8>, format: ImageFormat) -> Result<Vec<u8>, RenderError> {
    match format {
        ImageFormat::Png => Ok(png_data),
        ImageFormat::Jpeg => {
            let img = image::load_from_memory(&png_data)
                .map_err(|e| RenderError::extraction_error(e.to_string()))?;
            let mut jpeg_data = Vec::new();
            img.write_to(&mut std::io::Cursor::new(&mut jpeg_data), image::ImageFormat::Jpeg)
                .map_err(|e| RenderError::extraction_error(e.to_string()))?;
            Ok(jpeg_data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_passthrough_skips_reencoding() {
        let data = vec![0x89, 0x50, 0x4e, 0x47];
        let out = reencode(data.clone(), ImageFormat::Png).unwrap();
        assert_eq!(out, data);
    }
}
