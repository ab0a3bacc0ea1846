//! Charts module - chart projection and rendering

mod projection;
mod renderer;

pub use renderer::{RenderReport, StaticChartRenderer};
