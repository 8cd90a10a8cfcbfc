//! Locate RDS SQL Server databases by `<instance_id>/<name>`.
//!
//! The RDS API only lists databases page by page, so a lookup fetches the
//! whole listing and picks the record out with a path query.

pub mod hcso;
pub mod resource;
