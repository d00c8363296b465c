//! Charts module - Chart rendering

mod renderer;

pub use renderer::{ChartKind, RenderError, StaticChartRenderer};
