//! Shaderloop Render Engine
//!
//! Turns render jobs into files: runs each resolution through a rendering
//! surface, verifies the captured sequence and hands it to the encoder.
//!
//! # Pipeline Architecture
//!
//! ```text
//! RenderJob ──► launch ──► configure ──► load ──► await ready
//!                                                     │
//!                       ┌─────────────────────────────┘
//!                       ▼
//!              capture 0..N  /  capture one
//!                       │
//!                       ├── destroy surface
//!                       ▼
//!            verify ──► ffmpeg ──► shader-loop.webm
//!                                  frame_<i>.<ext>
//! ```

pub mod coordinator;
pub mod encode;
pub mod report;

pub use coordinator::*;
pub use encode::*;
pub use report::*;
