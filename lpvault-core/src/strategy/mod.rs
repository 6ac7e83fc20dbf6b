pub mod parameters;
pub mod registry;
pub mod templates;
