//! Remote driver transport, retrying execution, metadata probing and
//! directory provisioning.

pub mod driver;
pub mod executor;
pub mod probe;
pub mod provision;

pub use driver::{CliDriver, DriverOp, DriverTransport, TransportError};
pub use executor::{ExecError, RetryingExecutor};
pub use probe::{ChecksumConfidence, MetadataResult, RemoteChecksum, RemoteProbe};
pub use provision::{DirectoryProvisioner, ProvisionOutcome};
