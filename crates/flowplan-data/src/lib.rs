pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, LoadedData, PlannerSettings, load_catalog_file, load_dir};
