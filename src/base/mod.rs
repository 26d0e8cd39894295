mod channel;
mod error;
mod traits;

pub use self::channel::*;
pub use self::error::{Error, FaultLocation, IoError, ProtocolFault, Result};
pub use self::traits::Transport;
