//! Blob storage adapters implementing the domain `BlobStorage` trait.

pub mod local;

pub use local::LocalBlobStorage;
