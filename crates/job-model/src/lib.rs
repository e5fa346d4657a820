//! Shaderloop Job Model
//!
//! Defines the data contracts shared by the capture and render engines:
//! - **Resolutions:** output sizes and the built-in preset list
//! - **Jobs:** sequence vs. still export for one resolution
//! - **Layout:** frame file naming and output paths
//!
//! Frame indices are zero-based. Sequence frame names are zero-padded so
//! that lexicographic order equals frame order.

pub mod job;
pub mod layout;
pub mod resolution;

pub use job::*;
pub use layout::*;
pub use resolution::*;
