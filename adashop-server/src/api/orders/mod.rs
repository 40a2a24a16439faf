//! Order endpoints.

pub(super) mod create;
pub(super) mod get_order;
pub(super) mod update_status;
pub(super) mod user_orders;
