pub mod choreo;
pub mod event;
pub mod step;
pub mod video;
pub mod world;
