//! Object storage: contract, backends, and the unified façade.
//!
//! The [`backend::StorageBackend`] trait abstracts over which cloud
//! provider holds the bytes.  [`s3::S3Backend`] and [`blob::BlobBackend`]
//! are the two implementations; [`gateway::StorageGateway`] hides which
//! one (if either) is active.

pub mod backend;
pub mod blob;
pub mod gateway;
pub mod s3;
