pub mod gamepad;
pub mod input;
pub mod panorama;
pub mod renderer;
pub mod sound;
