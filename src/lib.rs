//! PicForge — a non-destructive photo pipeline and overlay/compositing engine.
//!
//! The library turns a stored set of parameters (tonal adjustments, a named
//! look filter, geometric transforms, a crop rectangle) plus transient
//! paint/placement layers into a rendered pixel buffer, with a cheap
//! preview path and a full-resolution export path sharing one fixed stage
//! order.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod cli;
pub mod compositor;
pub mod editor;
pub mod error;
pub mod io;
pub mod ops;
pub mod overlays;
pub mod refine;
pub mod render;

pub use compositor::RoiRect;
pub use editor::{
    GeometrySettings, ParamKey, Recipe, RenderPipeline, RenderTarget, ToneParams,
};
pub use error::EngineError;
pub use ops::filters::FilterId;
pub use ops::geometry::CropRect;
pub use render::{CancelToken, RenderOutput, RenderRequest, RenderWorker};
