//! Outer surfaces: the HTTP/websocket API and the CSV export.

pub mod csv;
pub mod http;
