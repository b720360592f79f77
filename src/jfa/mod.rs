//! Jump-flood Voronoi / distance-field pipeline.
//!
//! A binary seed image is turned into an approximate discrete Voronoi
//! diagram and Euclidean distance field entirely on the GPU: a Seed pass
//! marks foreground texels as their own nearest seed, a logarithmic series
//! of Flood passes propagates nearest-seed candidates at halving offsets
//! between two ping-pong state textures, and a Display pass maps the result
//! to color on the presentation surface.

pub mod controller;
pub mod passes;
pub mod quad;
pub mod schedule;
pub mod seeds;
pub mod store;

pub use controller::JfaController;
pub use seeds::{catalog_shape, SeedImage, CATALOG_LEN};
