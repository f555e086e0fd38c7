// [libs/infra/db/src/lib.rs]

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::DbError;
