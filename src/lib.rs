//! # IMAP METADATA engine
//!
//! imap-metadata implements the server side of the IMAP METADATA extension
//! ([RFC 5464]): parsing of the GETMETADATA and SETMETADATA commands,
//! command processing against a transactional annotation store, account-wide
//! limits, change broadcasting, and response encoding.
//!
//! Only private annotations are supported; there is no access model for
//! shared ones. Annotations attach either to one mailbox or to the account
//! as a whole (requested with the empty mailbox name).
//!
//! ## Example
//!
//! ```rust
//! use imap_metadata::{
//!     account::{Account, LineResult},
//!     encode::Encoder,
//!     memory::MemoryStore,
//!     ResponseCodec,
//! };
//!
//! let account = Account::new(MemoryStore::new());
//!
//! let input = b"A1 SETMETADATA \"\" (/private/comment \"My comment\")\r\n";
//! match account.handle_line(input) {
//!     LineResult::Done { responses, .. } => {
//!         for response in &responses {
//!             let bytes = ResponseCodec.encode(response).dump();
//!             assert_eq!(bytes, b"A1 OK setmetadata done\r\n");
//!         }
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! Note that traces are not guaranteed to be UTF-8: annotation values are
//! bytes, and binary values travel as literal8.
//!
//! [RFC 5464]: https://tools.ietf.org/html/rfc5464

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

mod core;

pub mod account;
pub mod command;
pub mod encode;
pub mod entry;
pub mod matcher;
pub mod memory;
pub mod notify;
pub mod parse;
pub mod quota;
pub mod response;
pub mod store;

pub use encode::ResponseCodec;
pub use parse::{DecodeError, LiteralMode};
