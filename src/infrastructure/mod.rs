pub mod csv_loader;
pub mod model_store;
pub mod observability;
