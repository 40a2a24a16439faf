//! Payment progress events.
//!
//! The payment driver reports every state change of every order on an mpsc
//! channel. Events carry the order id and currency key only, so a receiver
//! that needs the order looks it up in its own state.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, PaymentEventReceiver, PaymentEventSender, payment_event_channel,
    payment_event_stream,
};

pub use types::{PaymentEvent, PaymentStatus};
