//! MDB master protocol engine (§4.5): pure state machine plus its
//! supporting result/state data types. All register-level glue is in
//! `src/uart.rs` and `src/isr.rs`.

pub mod engine;
pub mod result;
pub mod state;
