//! Output resolutions and the built-in preset list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One output resolution. Each spec is rendered by an independent run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionSpec {
    /// Viewport width in CSS pixels.
    pub width: u32,
    /// Viewport height in CSS pixels.
    pub height: u32,
    /// Display label used in logs and reports.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("resolution must be WIDTHxHEIGHT or a preset name, got {0:?}")]
    Malformed(String),

    #[error("resolution dimensions must be positive, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
}

/// A named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Preset {
    /// The parenthesized part of the name, e.g. "Full HD".
    pub fn descriptor(&self) -> &'static str {
        self.name
            .split_once('(')
            .and_then(|(_, rest)| rest.strip_suffix(')'))
            .unwrap_or(self.name)
    }

    pub fn spec(&self) -> ResolutionSpec {
        ResolutionSpec {
            width: self.width,
            height: self.height,
            label: self.name.to_string(),
        }
    }
}

pub const PRESETS: [Preset; 5] = [
    Preset {
        name: "2560x1440 (QHD)",
        width: 2560,
        height: 1440,
    },
    Preset {
        name: "1920x1080 (Full HD)",
        width: 1920,
        height: 1080,
    },
    Preset {
        name: "3440x1440 (Ultrawide 21:9)",
        width: 3440,
        height: 1440,
    },
    Preset {
        name: "1080x1920 (Vertical Mobile)",
        width: 1080,
        height: 1920,
    },
    Preset {
        name: "900x1600 (Tablet/Mobile)",
        width: 900,
        height: 1600,
    },
];

impl ResolutionSpec {
    /// Create a spec, rejecting zero dimensions.
    pub fn new(width: u32, height: u32, label: impl Into<String>) -> Result<Self, ResolutionError> {
        if width == 0 || height == 0 {
            return Err(ResolutionError::ZeroDimension { width, height });
        }
        Ok(Self {
            width,
            height,
            label: label.into(),
        })
    }

    /// `<width>x<height>`, used for directory names.
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Look up a preset by its dimensions, its full label, or a
    /// case-insensitive substring of its descriptor ("qhd", "vertical").
    pub fn preset(query: &str) -> Option<Self> {
        let needle = query.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        PRESETS
            .iter()
            .find(|p| {
                format!("{}x{}", p.width, p.height) == needle
                    || p.name.to_ascii_lowercase() == needle
            })
            .or_else(|| {
                PRESETS
                    .iter()
                    .find(|p| p.descriptor().to_ascii_lowercase().contains(&needle))
            })
            .map(Preset::spec)
    }

    /// All presets, in menu order.
    pub fn presets() -> Vec<Self> {
        PRESETS.iter().map(Preset::spec).collect()
    }
}

impl FromStr for ResolutionSpec {
    type Err = ResolutionError;

    /// Accepts a preset name (keeping the preset label) or any `WxH` pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(preset) = Self::preset(s) {
            return Ok(preset);
        }

        let trimmed = s.trim();
        let (w, h) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| ResolutionError::Malformed(s.to_string()))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| ResolutionError::Malformed(s.to_string()))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| ResolutionError::Malformed(s.to_string()))?;

        Self::new(width, height, format!("{width}x{height}"))
    }
}

impl fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_custom_dimensions() {
        let spec: ResolutionSpec = "1280x720".parse().unwrap();
        assert_eq!((spec.width, spec.height), (1280, 720));
        assert_eq!(spec.label, "1280x720");
    }

    #[test]
    fn test_parse_preset_dimensions_keeps_label() {
        let spec: ResolutionSpec = "1920x1080".parse().unwrap();
        assert_eq!(spec.label, "1920x1080 (Full HD)");
    }

    #[test]
    fn test_preset_by_name() {
        let spec = ResolutionSpec::preset("vertical").unwrap();
        assert_eq!((spec.width, spec.height), (1080, 1920));
        assert!(ResolutionSpec::preset("imax").is_none());
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(matches!(
            "0x1080".parse::<ResolutionSpec>(),
            Err(ResolutionError::ZeroDimension { .. })
        ));
        assert!(matches!(
            "huge".parse::<ResolutionSpec>(),
            Err(ResolutionError::Malformed(_))
        ));
        assert!(matches!(
            "19x".parse::<ResolutionSpec>(),
            Err(ResolutionError::Malformed(_))
        ));
    }

    #[test]
    fn test_dimensions_string() {
        let spec = ResolutionSpec::preset("tablet").unwrap();
        assert_eq!(spec.dimensions(), "900x1600");
    }
}
