pub mod correspondence;
pub mod descriptor;
pub mod error;
pub mod geometry;
pub mod point_cloud;
pub mod reference_frame;
pub mod runtime;

pub use correspondence::*;
pub use descriptor::*;
pub use error::{Error, Result};
pub use geometry::*;
pub use point_cloud::*;
pub use reference_frame::*;
pub use runtime::{current_cpu_threads, init_global_thread_pool};
