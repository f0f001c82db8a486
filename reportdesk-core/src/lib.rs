//! reportdesk-core: domain types shared by the reportdesk server
//!
//! Everything here is free of I/O: validation of user input, slug
//! generation, output formats, data-source resolution and the render
//! request handed to the external report engine.

pub mod error;
pub mod models;
pub mod render;

pub use error::CoreError;
pub use render::{RenderRequest, RenderedReport};
