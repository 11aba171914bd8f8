//! Seed points: view/volume coordinate mapping, label colors, and the
//! per-session point registry.

pub mod coords;
pub mod palette;
pub mod registry;

pub use coords::{Axis, Pixel, SliceKey, Voxel};
pub use palette::{PaletteEntry, Rgb, color_for, name_for, palette};
pub use registry::{Label, PointError, PointRegistry, ProjectedPoint, SeedPoint};
