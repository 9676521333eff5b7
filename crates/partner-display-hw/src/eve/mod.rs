//! EVE graphics controller protocol.
//!
//! Memory map, host commands and coprocessor opcodes live in [`registers`],
//! display-list word encoders in [`dl`], and the SPI-level client that reads
//! and writes the controller's address space in [`client`].

pub mod client;
pub mod dl;
pub mod registers;

pub use client::{ring_free_space, EveClient};
