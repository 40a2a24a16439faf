#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod backend;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod currency;
pub mod entities;
pub mod events;
pub mod framework;
pub mod model;
pub mod payment;
pub mod reconcile;
pub mod service;
pub mod stock;
pub mod store;

#[cfg(test)]
mod testing;
