pub mod demo;
pub mod file;
pub mod model;

pub use file::{
    EventFileIndex, FORMAT_TAG, FORMAT_VERSION, IndexEntry, display_name, write_event_file,
};
pub use model::{EventData, Geometry, Hit, Trajectory, Volume};
