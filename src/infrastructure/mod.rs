//! Adapters behind the domain ports: storage backends, the in-process
//! notification bus and the outbound payment gateway clients.

pub mod broadcast;
pub mod in_memory;
pub mod providers;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
