//! # OCR Processing Module
//!
//! This module turns a page image into positioned text nodes.
//!
//! ## Features
//!
//! - A [`Recognizer`] seam so the engine can run on any OCR backend
//! - Tesseract backend via `leptess` producing hOCR (feature `tesseract`)
//! - hOCR word parsing into [`TextNode`]s
//! - Input validation with format detection and format-specific size limits
//!
//! ## Supported Image Formats
//!
//! - PNG (Portable Network Graphics)
//! - JPEG/JPG (Joint Photographic Experts Group)
//! - BMP (Bitmap)
//! - TIFF/TIF (Tagged Image File Format)

use image::DynamicImage;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{InBodyError, InBodyResult};
use crate::ocr_config::OcrConfig;

/// Axis-aligned bounding box in image pixels.
///
/// `x0`/`y0` is the top-left corner and `x1`/`y1` the bottom-right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BBox {
    /// Builds a box, swapping coordinates given in the wrong order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.x0 + self.x1) / 2, (self.y0 + self.y1) / 2)
    }

    /// Whether `point` lies inside the box, borders included.
    pub fn contains(&self, point: (i32, i32)) -> bool {
        (self.x0..=self.x1).contains(&point.0) && (self.y0..=self.y1).contains(&point.1)
    }
}

/// One recognized word and where it sits on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    pub bbox: BBox,
    pub center: (i32, i32),
}

impl TextNode {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            center: bbox.center(),
            bbox,
        }
    }
}

/// An OCR backend.
///
/// Implementations must be usable from several threads at once; any
/// backend state must be created per call.
pub trait Recognizer: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Recognizes all words in `image`.
    ///
    /// # Errors
    ///
    /// `InBodyError::Recognition` when the backend cannot run.
    fn recognize(&self, image: &DynamicImage) -> InBodyResult<Vec<TextNode>>;
}

lazy_static! {
    static ref HOCR_WORD: Regex = Regex::new(
        r#"(?s)<span\s[^>]*?class=['"]ocrx_word['"][^>]*?title=['"]bbox\s+(-?\d+)\s+(-?\d+)\s+(-?\d+)\s+(-?\d+)[^'"]*['"][^>]*>(.*?)</span>"#
    )
    .expect("Invalid hOCR word regex pattern");
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex pattern");
    static ref NUMERIC_ENTITY: Regex =
        Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("Invalid numeric entity regex pattern");
}

/// Parses the `ocrx_word` spans of an hOCR document into text nodes.
///
/// Inline markup inside a word (`<strong>`, `<em>`) is stripped, HTML
/// entities are decoded and empty words are dropped.
///
/// # Examples
///
/// ```
/// use inbody_extract::ocr::parse_hocr_words;
///
/// let hocr = "<span class='ocrx_word' id='word_1_1' title='bbox 10 20 110 60; x_wconf 91'>체중</span>";
/// let nodes = parse_hocr_words(hocr);
/// assert_eq!(nodes.len(), 1);
/// assert_eq!(nodes[0].text, "체중");
/// assert_eq!(nodes[0].center, (60, 40));
/// ```
pub fn parse_hocr_words(hocr: &str) -> Vec<TextNode> {
    HOCR_WORD
        .captures_iter(hocr)
        .filter_map(|caps| {
            let coord = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());
            let bbox = BBox::new(coord(1)?, coord(2)?, coord(3)?, coord(4)?);
            let raw = caps.get(5).map_or("", |m| m.as_str());
            let text = decode_entities(&HTML_TAG.replace_all(raw, ""));
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(TextNode::new(text, bbox))
            }
        })
        .collect()
}

/// Decodes numeric character references, then the named XML entities.
/// `&amp;` goes last so an escaped reference stays literal.
fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        match code.and_then(char::from_u32) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });

    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Validates an encoded image buffer and returns its detected format.
///
/// Checks, in order: non-empty input, the general size limit, enough bytes
/// for format detection, a supported format, and the format-specific limit.
///
/// # Errors
///
/// `InBodyError::ImageLoad` describing the first failed check.
pub fn validate_image_bytes(bytes: &[u8], config: &OcrConfig) -> InBodyResult<image::ImageFormat> {
    if bytes.is_empty() {
        return Err(InBodyError::ImageLoad("image data is empty".to_string()));
    }

    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(InBodyError::ImageLoad(format!(
            "image too large: {} bytes (maximum allowed: {} bytes)",
            size, config.max_file_size
        )));
    }

    if bytes.len() < config.min_format_bytes {
        return Err(InBodyError::ImageLoad(format!(
            "cannot determine image format from {} bytes (need at least {})",
            bytes.len(),
            config.min_format_bytes
        )));
    }

    let header = &bytes[..bytes.len().min(config.buffer_size)];
    let format = image::guess_format(header)
        .map_err(|e| InBodyError::ImageLoad(format!("unrecognized image format: {}", e)))?;

    let limit = config.format_limits.limit_for(format).ok_or_else(|| {
        InBodyError::ImageLoad(format!("unsupported image format {:?}", format))
    })?;

    if size > limit {
        return Err(InBodyError::ImageLoad(format!(
            "image file too large for {:?} format: {} bytes (maximum allowed: {} bytes)",
            format, size, limit
        )));
    }

    debug!(format = ?format, size_bytes = size, "Image input validated");
    Ok(format)
}

/// Validates and decodes an encoded image.
pub fn decode_image(bytes: &[u8], config: &OcrConfig) -> InBodyResult<DynamicImage> {
    let format = validate_image_bytes(bytes, config)?;
    Ok(image::load_from_memory_with_format(bytes, format)?)
}

/// Reads, validates and decodes an image file.
pub fn load_image_file(path: &std::path::Path, config: &OcrConfig) -> InBodyResult<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| {
        InBodyError::ImageLoad(format!("cannot read {}: {}", path.display(), e))
    })?;
    decode_image(&bytes, config)
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::io::Cursor;

    use image::DynamicImage;
    use leptess::LepTess;
    use tracing::info;

    use super::{parse_hocr_words, Recognizer, TextNode};
    use crate::errors::{InBodyError, InBodyResult};
    use crate::ocr_config::OcrConfig;

    /// Resolution reported to Tesseract; report photos carry no usable DPI.
    const SOURCE_RESOLUTION: i32 = 300;

    /// Tesseract backend. A fresh engine is initialised for every call.
    #[derive(Debug, Clone)]
    pub struct TesseractRecognizer {
        config: OcrConfig,
    }

    impl TesseractRecognizer {
        pub fn new(config: OcrConfig) -> InBodyResult<Self> {
            config.validate()?;
            Ok(Self { config })
        }

        pub fn config(&self) -> &OcrConfig {
            &self.config
        }

        /// Checks that Tesseract starts with the configured languages.
        pub fn probe(&self) -> InBodyResult<()> {
            self.engine().map(|_| ())
        }

        fn engine(&self) -> InBodyResult<LepTess> {
            let mut tess = LepTess::new(self.config.tessdata_path.as_deref(), &self.config.languages)
                .map_err(|e| {
                    InBodyError::Recognition(format!(
                        "Failed to initialize Tesseract for '{}': {}",
                        self.config.languages, e
                    ))
                })?;

            tess.set_variable(
                leptess::Variable::TesseditPagesegMode,
                self.config.psm_mode.as_str(),
            )
            .map_err(|e| InBodyError::Recognition(format!("Failed to set PSM mode: {}", e)))?;

            if let Some(whitelist) = &self.config.character_whitelist {
                tess.set_variable(leptess::Variable::TesseditCharWhitelist, whitelist)
                    .map_err(|e| {
                        InBodyError::Recognition(format!(
                            "Failed to set character whitelist: {}",
                            e
                        ))
                    })?;
            }

            Ok(tess)
        }
    }

    impl Recognizer for TesseractRecognizer {
        fn name(&self) -> &str {
            "tesseract"
        }

        fn recognize(&self, image: &DynamicImage) -> InBodyResult<Vec<TextNode>> {
            let start_time = std::time::Instant::now();

            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| InBodyError::Recognition(format!("Failed to encode page: {}", e)))?;

            let mut tess = self.engine()?;
            tess.set_image_from_mem(&png).map_err(|e| {
                InBodyError::Recognition(format!("Failed to load image for OCR: {}", e))
            })?;
            tess.set_source_resolution(SOURCE_RESOLUTION);

            let hocr = tess.get_hocr_text(0).map_err(|e| {
                InBodyError::Recognition(format!("Failed to extract hOCR from image: {}", e))
            })?;

            let nodes = parse_hocr_words(&hocr);
            info!(
                languages = %self.config.languages,
                words = nodes.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "OCR processing completed"
            );
            Ok(nodes)
        }
    }
}

/// Logs a one-line summary of recognized nodes at info level.
pub fn log_recognition_summary(recognizer: &dyn Recognizer, nodes: &[TextNode]) {
    let numeric = nodes
        .iter()
        .filter(|n| n.text.chars().any(|c| c.is_ascii_digit()))
        .count();
    info!(
        backend = recognizer.name(),
        nodes = nodes.len(),
        numeric_nodes = numeric,
        "Recognition finished"
    );
}
