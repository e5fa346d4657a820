//! Captured frame payloads.
//!
//! The content returns frames as `data:image/<subtype>;base64,<payload>`.
//! Any subtype is accepted; a string without that prefix is a capture error.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use shaderloop_common::error::{ShaderloopError, ShaderloopResult};
use shaderloop_job_model::ImageFormat;

const DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Zero-based frame index.
    pub index: u32,
    /// MIME subtype reported by the content, lowercased (`png`, `webp`, ...).
    pub subtype: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl CapturedFrame {
    /// Decode a `data:image/<subtype>;base64,` payload.
    pub fn from_data_uri(index: u32, payload: &str) -> ShaderloopResult<Self> {
        let rest = payload.trim().strip_prefix(DATA_URI_PREFIX).ok_or_else(|| {
            ShaderloopError::capture(
                index,
                format!(
                    "payload is not an image data URI (starts with {:?})",
                    preview(payload)
                ),
            )
        })?;

        let (subtype, encoded) = rest.split_once(BASE64_MARKER).ok_or_else(|| {
            ShaderloopError::capture(index, "image data URI is not base64-encoded")
        })?;

        if subtype.is_empty()
            || !subtype
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        {
            return Err(ShaderloopError::capture(
                index,
                format!("image data URI has an invalid subtype {subtype:?}"),
            ));
        }

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ShaderloopError::capture(index, format!("invalid base64 payload: {e}")))?;
        if bytes.is_empty() {
            return Err(ShaderloopError::capture(index, "image payload is empty"));
        }

        Ok(Self {
            index,
            subtype: subtype.to_ascii_lowercase(),
            bytes,
        })
    }

    /// Format of the payload, when it is one we can write directly.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_subtype(&self.subtype)
    }

    /// Bytes encoded as `target`, transcoding when the content answered
    /// with a different subtype.
    pub fn into_format(self, target: ImageFormat) -> ShaderloopResult<Vec<u8>> {
        if self.format() == Some(target) {
            return Ok(self.bytes);
        }

        tracing::debug!(
            index = self.index,
            from = %self.subtype,
            to = %target,
            "Transcoding frame payload"
        );

        let image = image::load_from_memory(&self.bytes).map_err(|e| {
            ShaderloopError::capture(
                self.index,
                format!("cannot decode {} payload: {e}", self.subtype),
            )
        })?;

        // JPEG has no alpha channel.
        let image = match target {
            ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(image.to_rgb8()),
            ImageFormat::Png | ImageFormat::Webp => image,
        };

        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, codec_for(target))
            .map_err(|e| {
                ShaderloopError::capture(self.index, format!("cannot encode frame as {target}: {e}"))
            })?;
        Ok(out.into_inner())
    }
}

fn codec_for(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Webp => image::ImageFormat::WebP,
    }
}

fn preview(payload: &str) -> String {
    payload.chars().take(24).collect()
}
