//! Shaderloop Capture Engine
//!
//! Drives a rendering surface (headless Chrome) through animation frames and
//! writes each frame to disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                FrameSequencer                 │
//! │     index 0..N ──► capture_frame(index)       │
//! │                        │                      │
//! │  ┌─────────────────────▼────────────────────┐ │
//! │  │  RenderSurface (WebDriverSurface)        │ │
//! │  │  chromedriver ─► Chrome ─► renderFrame() │ │
//! │  └─────────────────────┬────────────────────┘ │
//! │                        ▼                      │
//! │        data:image/png;base64,... ─► bytes     │
//! └────────────────────────┬─────────────────────┘
//!                          ▼
//!               frames/frame_000.png ...
//! ```

pub mod backend;
pub mod frame;
pub mod sequencer;
pub mod surface;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use frame::CapturedFrame;
pub use sequencer::*;
pub use surface::*;
