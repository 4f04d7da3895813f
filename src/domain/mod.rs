pub mod catalog;
pub mod nav;
