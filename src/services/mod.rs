pub mod comparison;
pub mod ingest;
pub mod presenter;
pub mod preview;
pub mod store;
