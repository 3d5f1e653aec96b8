pub mod cache;
pub mod enrich;
pub mod settings;
