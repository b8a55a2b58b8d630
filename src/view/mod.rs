//! Display model for the compact and detailed task surfaces

pub mod fragment;
pub mod projector;

pub use fragment::{Fragment, SurfaceKind};
pub use projector::{Projector, ProjectorOptions};
