pub mod dose;
pub mod framework;
pub mod geometry;
