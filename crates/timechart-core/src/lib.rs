// File: crates/timechart-core/src/lib.rs
// Summary: Core library entry point; exports the chart engine and its building blocks.

pub mod annotation;
pub mod axis;
pub mod backend;
pub mod chart;
pub mod color;
pub mod config;
#[cfg(feature = "csv")]
pub mod csv_input;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod grid;
pub mod histogram;
pub mod hit;
pub mod interaction;
pub mod memory;
pub mod render;
pub mod scale;
pub mod scheduler;
pub mod series;
pub mod theme;
pub mod types;
pub mod view;

pub use annotation::AnnotationForm;
pub use axis::{AxisSide, XAxis, YAxis};
pub use backend::{Backend, BackendFuture, Comment, CommentQuery};
pub use chart::{Chart, EditOutcome, LegendEntry, RangeFields};
pub use color::ColorTable;
pub use config::ChartConfig;
pub use error::{BackendError, ChartError};
pub use frame::{Frame, Primitive, TextAlign};
pub use histogram::Histogram;
pub use hit::{Hit, Tooltip};
pub use interaction::{DragMode, Gesture, Interaction};
pub use memory::MemoryBackend;
pub use scheduler::{Admission, Scheduler};
pub use series::{Dataset, Point};
pub use theme::Theme;
pub use types::{Color, Insets};
pub use view::ViewState;
