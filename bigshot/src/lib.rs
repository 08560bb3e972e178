//! bigshot: panorama face rendering, tiled image pyramids and packed archives
//!
//! - [`projection`] renders rectilinear views of equirectangular or
//!   cylindrical panoramas in parallel.
//! - [`pyramid`] halves an image into levels, slices each level into tiles
//!   and writes a descriptor.
//! - [`archive`] packs a generated tree into one indexed `BIGSHOT` file.
//! - [`config`] and [`pipeline`] turn a job description into files on disk.

pub mod archive;
pub mod codec;
pub mod config;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod projection;
pub mod pyramid;
pub mod raster;
pub mod sampler;
pub mod trig;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use codec::{ImageCodec, OutputFormat, StandardCodec};
pub use config::{Job, JobOptions};
pub use error::{BigshotError, ErrorCategory, Result};
pub use math::{Orientation, Point3, RotationTransform};
pub use pipeline::run_job;
pub use projection::{ProjectionConfig, ProjectionModel, Projector};
pub use pyramid::{make_pyramid, PyramidConfig};
pub use raster::{ChannelLayout, Image};
