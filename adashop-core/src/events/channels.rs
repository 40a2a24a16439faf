//! Payment event channel factories and handles.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::types::PaymentEvent;

/// Default buffer size for event channels.
///
/// A checkout emits at most two events per order, so this never fills in
/// practice.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for PaymentEvent events.
pub type PaymentEventSender = mpsc::Sender<PaymentEvent>;
/// Receiver handle for PaymentEvent events.
pub type PaymentEventReceiver = mpsc::Receiver<PaymentEvent>;

/// Create a new PaymentEvent channel.
pub fn payment_event_channel() -> (PaymentEventSender, PaymentEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Adapt a receiver for consumers that work on streams.
pub fn payment_event_stream(rx: PaymentEventReceiver) -> ReceiverStream<PaymentEvent> {
    ReceiverStream::new(rx)
}
