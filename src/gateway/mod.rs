//! Gateway construction and the composed client.

mod builder;
mod client;

pub use builder::{Rotom, RotomBuilder};
pub use client::RotomClient;
