//! Status vocabularies and the order lifecycle rules.
//!
//! Statuses are stored as strings; these helpers are the single place that
//! knows which values exist and which transitions are legal.

use crate::error::AppError;

pub const ORDER_STATUSES: [&str; 7] = [
    "pending",
    "confirmed",
    "processing",
    "shipped",
    "delivered",
    "cancelled",
    "refunded",
];

pub const ORDER_PAYMENT_STATUSES: [&str; 4] = ["pending", "paid", "failed", "refunded"];

pub const PAYMENT_STATUSES: [&str; 7] = [
    "pending",
    "processing",
    "completed",
    "failed",
    "cancelled",
    "refunded",
    "partially_refunded",
];

pub const INVOICE_STATUSES: [&str; 5] = ["draft", "sent", "paid", "overdue", "cancelled"];

/// Position of a status on the forward fulfilment path, if it is on it.
fn order_rank(status: &str) -> Option<u8> {
    match status {
        "pending" => Some(0),
        "confirmed" => Some(1),
        "processing" => Some(2),
        "shipped" => Some(3),
        "delivered" => Some(4),
        _ => None,
    }
}

pub fn validate_order_status(status: &str) -> Result<(), AppError> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid order status '{status}'"
        )))
    }
}

pub fn validate_order_payment_status(status: &str) -> Result<(), AppError> {
    if ORDER_PAYMENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid payment status '{status}'"
        )))
    }
}

pub fn validate_invoice_status(status: &str) -> Result<(), AppError> {
    if INVOICE_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid invoice status '{status}'"
        )))
    }
}

/// An order may be cancelled until it has left the warehouse.
pub fn order_can_cancel(status: &str) -> bool {
    matches!(status, "pending" | "confirmed" | "processing")
}

/// Forward transitions are monotonic; cancel follows [`order_can_cancel`];
/// refund is only reachable after delivery (money flows back through the
/// payment resource, which flips the order's payment_status separately).
pub fn order_can_transition(from: &str, to: &str) -> bool {
    if from == to {
        return false;
    }
    match to {
        "cancelled" => order_can_cancel(from),
        "refunded" => from == "delivered",
        _ => match (order_rank(from), order_rank(to)) {
            (Some(f), Some(t)) => t > f,
            _ => false,
        },
    }
}

/// A payment in a terminal state can no longer be confirmed or superseded.
pub fn payment_is_terminal(status: &str) -> bool {
    matches!(
        status,
        "completed" | "failed" | "cancelled" | "refunded" | "partially_refunded"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_monotonic() {
        assert!(order_can_transition("pending", "confirmed"));
        assert!(order_can_transition("pending", "shipped"));
        assert!(order_can_transition("processing", "delivered"));
        assert!(!order_can_transition("shipped", "processing"));
        assert!(!order_can_transition("delivered", "pending"));
        assert!(!order_can_transition("confirmed", "confirmed"));
    }

    #[test]
    fn cancel_only_before_shipping() {
        assert!(order_can_transition("pending", "cancelled"));
        assert!(order_can_transition("confirmed", "cancelled"));
        assert!(order_can_transition("processing", "cancelled"));
        assert!(!order_can_transition("shipped", "cancelled"));
        assert!(!order_can_transition("delivered", "cancelled"));
        assert!(!order_can_transition("cancelled", "cancelled"));
    }

    #[test]
    fn refund_requires_delivery() {
        assert!(order_can_transition("delivered", "refunded"));
        assert!(!order_can_transition("pending", "refunded"));
        assert!(!order_can_transition("cancelled", "refunded"));
    }

    #[test]
    fn cancelled_is_a_dead_end() {
        for to in ORDER_STATUSES {
            assert!(!order_can_transition("cancelled", to), "cancelled -> {to}");
        }
    }

    #[test]
    fn unknown_statuses_are_rejected() {
        assert!(validate_order_status("archived").is_err());
        assert!(validate_order_payment_status("void").is_err());
        assert!(validate_invoice_status("final").is_err());
        assert!(validate_order_status("pending").is_ok());
    }

    #[test]
    fn terminal_payments() {
        assert!(payment_is_terminal("completed"));
        assert!(payment_is_terminal("partially_refunded"));
        assert!(!payment_is_terminal("pending"));
        assert!(!payment_is_terminal("processing"));
    }
}
