#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

//! Wire types shared between the adashop checkout core, its backend server
//! and any client talking to that server.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
