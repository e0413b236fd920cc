mod error;

pub use error::{ErrorKind, ExitCode, SatchelError, SatchelResult};
