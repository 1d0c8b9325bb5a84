mod schema;
mod url;

pub mod aggregate;
pub mod analytics;
pub mod db;
pub mod migrations;
pub mod models;
pub mod pool;

pub(crate) use schema::*;

pub use db::{QueryError, StoreError};
pub use pool::{ConnectionPool, PooledConnection};
pub use url::*;

pub use diesel::r2d2::PoolError;
pub use diesel::{Connection, PgConnection};
