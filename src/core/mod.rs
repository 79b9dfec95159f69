//! Core data types and boundary I/O.

pub mod loaders;
pub mod store;
pub mod writers;

pub use loaders::{load_cloud, LoadedCloud, LoaderError};
pub use store::{Label, PointStore};
pub use writers::{write_cleaned_ply, write_labeled_ply, write_labels_csv, WriteError};
