//! Client for the public microdata of DATASUS, the Brazilian health
//! information platform.
//!
//! The FTP tree is browsed through an [`FtpCatalog`](models::directory::FtpCatalog),
//! databases are queried through their adapters in [`databases`], downloads
//! land in a local cache as columnar tables and [`preprocessing`] decodes the
//! coded variables of the loaded frames.

pub mod databases;
pub mod errors;
pub mod models;
pub mod preprocessing;

pub use databases::{AnyDatabase, Database, Description, FileQuery, list_databases};
pub use errors::*;
pub use models::*;
