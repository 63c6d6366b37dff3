//! alink Runner Library
//!
//! This crate provides the protocol engine for the alink serial command
//! adapter: transports, the cooperative scheduler, the byte multiplexer that
//! lets scheduled work run while the link is idle, the command handlers, and
//! the engine loop that ties them together.
//!
//! # Example
//!
//! ```rust
//! use alink_runner::{AdapterConfig, Engine, MemoryTransport, Shutdown};
//!
//! let (transport, mut link) = MemoryTransport::pair();
//! link.send(&[0x21, 0x24, 0x05]);
//! link.close();
//!
//! let mut engine = Engine::new(&AdapterConfig::default(), transport)?;
//! assert_eq!(engine.run()?, Shutdown::InputClosed);
//! assert_eq!(link.take_output(), vec![0x62, 0x22, 0x40, 0x00]);
//! # Ok::<(), alink_runner::EngineError>(())
//! ```

pub mod config;
pub mod debug_menu;
pub mod engine;
pub mod error;
pub mod functions;
pub mod handlers;
pub mod multiplexer;
pub mod registers;
pub mod scheduler;
pub mod transport;

pub use config::AdapterConfig;
pub use engine::{Dispatcher, Engine, Shutdown};
pub use error::{ConfigError, EngineError, TaskError, TransportError};
pub use functions::{CommandInterceptor, DebugAction, FunctionState, FunctionTable};
pub use handlers::{CommandHandlers, Control};
pub use multiplexer::{ByteMultiplexer, IdleStrategy};
pub use registers::CvRegisters;
pub use scheduler::Scheduler;
#[cfg(unix)]
pub use transport::StdioTransport;
pub use transport::{read_field, BinaryModeGuard, MemoryLink, MemoryTransport, Transport};
