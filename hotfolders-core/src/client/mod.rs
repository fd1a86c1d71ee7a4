//! Remote conversion service client
//!
//! The orchestrator talks to the conversion service only through the
//! [`ConversionClient`] trait: submit a file, poll the job, download the
//! finished artifact. [`ZamzarClient`] implements it over HTTP.

pub mod download;
pub mod errors;
#[cfg(test)]
pub mod mock;
pub mod traits;
pub mod types;
pub mod zamzar;

pub use download::write_atomically;
pub use errors::{ClientError, SubmitError};
pub use traits::ConversionClient;
pub use types::{Artifact, JobHandle, JobStatus, RemoteError, Upload};
pub use zamzar::{ZamzarClient, ZamzarConfig};
