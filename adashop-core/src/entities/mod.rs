pub mod order_items;
pub mod orders;
pub mod products;
pub mod shipping_info;
pub mod stock_reservations;
pub mod supported_tokens;

use adashop_sdk::objects::OrderStatus as SdkOrderStatus;

/// Order status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `adashop_sdk::objects::OrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "order_status")]
pub enum OrderStatus {
    Pending,
    PaymentFailed,
    Paid,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether `self → next` is an edge of the order lifecycle.
    ///
    /// `pending → payment_failed | paid`, `paid → processing → shipped →
    /// completed`, and `pending | payment_failed → cancelled`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, PaymentFailed)
                | (Pending, Paid)
                | (Paid, Processing)
                | (Processing, Shipped)
                | (Shipped, Completed)
                | (Pending, Cancelled)
                | (PaymentFailed, Cancelled)
        )
    }

    /// `next` is either a lifecycle edge or the current status re-applied.
    pub fn accepts(self, next: OrderStatus) -> bool {
        self == next || self.can_transition_to(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses that give held stock back to the shelf.
    pub fn releases_stock(self) -> bool {
        matches!(self, OrderStatus::PaymentFailed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SdkOrderStatus::from(*self).fmt(f)
    }
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Pending => SdkOrderStatus::Pending,
            OrderStatus::PaymentFailed => SdkOrderStatus::PaymentFailed,
            OrderStatus::Paid => SdkOrderStatus::Paid,
            OrderStatus::Processing => SdkOrderStatus::Processing,
            OrderStatus::Shipped => SdkOrderStatus::Shipped,
            OrderStatus::Completed => SdkOrderStatus::Completed,
            OrderStatus::Cancelled => SdkOrderStatus::Cancelled,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(value: SdkOrderStatus) -> Self {
        match value {
            SdkOrderStatus::Pending => OrderStatus::Pending,
            SdkOrderStatus::PaymentFailed => OrderStatus::PaymentFailed,
            SdkOrderStatus::Paid => OrderStatus::Paid,
            SdkOrderStatus::Processing => OrderStatus::Processing,
            SdkOrderStatus::Shipped => OrderStatus::Shipped,
            SdkOrderStatus::Completed => OrderStatus::Completed,
            SdkOrderStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}

/// Lifecycle of one stock hold row.
///
/// A hold starts `held` (optionally bound to an order), and ends `consumed`
/// when its order is paid or `released` when the order fails, is cancelled,
/// or the hold is renewed. Expired `held` rows no longer count against
/// availability; the cleanup job flips them to `released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "reservation_status")]
pub enum ReservationStatus {
    Held,
    Consumed,
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_reapplying_status_is_accepted() {
        assert!(OrderStatus::PaymentFailed.accepts(OrderStatus::PaymentFailed));
        assert!(OrderStatus::Pending.accepts(OrderStatus::Paid));
        assert!(!OrderStatus::Cancelled.accepts(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.accepts(OrderStatus::Cancelled));
    }

    #[test]
    fn test_fulfillment_chain() {
        let chain = [
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Completed,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
        assert!(OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(OrderStatus::PaymentFailed.to_string(), "payment_failed");
    }
}
