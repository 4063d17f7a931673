pub mod class;
pub mod coordinate_system;
