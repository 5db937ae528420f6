//! Entities, state machines and the ports the application layer depends on.

pub mod bank_account;
pub mod booking;
pub mod notification;
pub mod payment;
pub mod ports;
pub mod principal;
