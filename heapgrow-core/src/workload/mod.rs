//! Write workload: identifiers, randomized records, and the pipelined writers

pub mod ident;
pub mod record;
pub mod writer;

pub use ident::IdGenerator;
pub use record::{RecordSampler, WriteRecord};
pub use writer::{run_writer, Backoff};
