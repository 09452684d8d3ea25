//! Hyper-V KVP pool file support.
//!
//! The Hyper-V integration services exchange key/value pairs between guest
//! and host through a "pool file": a flat sequence of fixed-size slots, each
//! holding one null-padded key and one null-padded value.
//!
//! This crate provides:
//! - The slot codec (`codec`): `(key, value)` <-> `[u8; SLOT_SIZE]`
//! - The pool file store (`store`): append, overwrite-by-key, and
//!   generation-scoped iteration over one pool file
//!
//! # Slot Layout
//!
//! ```text
//! 0                 512                                   2560
//! +-----------------+--------------------------------------+
//! | key (NUL pad)   | value (NUL pad)                      |
//! +-----------------+--------------------------------------+
//! ```
//!
//! Slot boundaries are absolute multiples of [`SLOT_SIZE`] from the start of
//! the file. An all-zero slot is empty.
//!
//! # Example
//!
//! ```no_run
//! use kvp_pool::PoolStore;
//!
//! let mut store = PoolStore::open("/var/lib/hyperv/.kvp_pool_1").unwrap();
//! store.append("PROVISIONING_REPORT", "result=success").unwrap();
//! for record in store.iterate(0).unwrap() {
//!     let record = record.unwrap();
//!     println!("{} = {}", record.key, record.value);
//! }
//! ```

pub mod codec;
pub mod error;
pub mod store;

pub use codec::{decode, decode_bytes, encode, KvpRecord, Slot};
pub use error::{EncodingError, PoolError, Result};
pub use store::{PoolIter, PoolStore, WriteLocation};

/// Encoded width of the key field.
pub const KEY_SIZE: usize = 512;

/// Encoded width of the value field.
pub const VALUE_SIZE: usize = 2048;

/// Width of one on-disk slot.
pub const SLOT_SIZE: usize = KEY_SIZE + VALUE_SIZE;

/// Well-known pool file the Hyper-V host reads guest telemetry from.
pub const DEFAULT_POOL_PATH: &str = "/var/lib/hyperv/.kvp_pool_1";
