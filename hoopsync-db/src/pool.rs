//! r2d2 writer pool for the sync pipeline. Each sync run checks out one
//! connection and keeps it for the run (single writer per source), so the
//! pool size effectively caps concurrent runs.

use crate::url::{database_url, DbConfigError};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use miette::Diagnostic;
use thiserror::Error;

pub type ConnectionPool = Pool<ConnectionManager<PgConnection>>;
pub type PooledConnection = diesel::r2d2::PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildPoolError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] DbConfigError),

    #[error("couldn't build the connection pool")]
    Pool(#[from] diesel::r2d2::PoolError),
}

pub fn get_pool(max_size: u32) -> Result<ConnectionPool, BuildPoolError> {
    let manager = ConnectionManager::new(database_url()?);
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}
