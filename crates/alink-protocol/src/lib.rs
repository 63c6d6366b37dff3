//! alink Wire Protocol
//!
//! This crate provides the byte level protocol spoken between a host
//! controller and the alink adapter: checksum framing and incremental
//! command recognition.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → adapter): a fixed command prefix, a fixed length
//!   payload and a trailing XOR checksum byte. Commands without payload carry
//!   no checksum.
//! - **Replies** (adapter → host): payload followed by its XOR checksum.
//!
//! Commands are recognized byte by byte with a [`Trie`]; once the prefix is
//! complete the selected handler reads its payload directly from the link.
//!
//! # Example
//!
//! ```rust
//! use alink_protocol::{command_trie, with_checksum, HandlerKind, Step};
//!
//! let trie = command_trie()?;
//! let mut walk = trie.walk();
//! assert_eq!(walk.push(0x21), Step::Continue);
//! assert_eq!(walk.push(0x24), Step::Continue);
//! assert_eq!(walk.push(0x05), Step::Matched(HandlerKind::Ping));
//!
//! assert_eq!(with_checksum(&[0x62, 0x22, 0x40]), vec![0x62, 0x22, 0x40, 0x00]);
//! # Ok::<(), alink_protocol::ProtocolError>(())
//! ```

mod commands;
mod constants;
mod error;
mod frame;
mod trie;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use trie::*;
