pub mod classes;
pub mod model;
