//! Point cloud file I/O
//!
//! Supports the PCD (Point Cloud Data, PCL) format in its `ascii` and
//! `binary` encodings.

pub mod pcd;

pub use pcd::{load_pcd, read_pcd, write_pcd, PcdData};

pub use cv_core::{Error, Result};
