#![doc = include_str!("../README.md")]
#![warn(unused_extern_crates, unreachable_pub, nonstandard_style)]

pub mod algorithm;
pub mod capabilities;
mod crypto;
pub mod definitions;
pub mod error;
pub mod otpauth;
pub mod prelude;
pub mod registration;
mod rng;
pub mod service;
