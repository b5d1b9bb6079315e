//! Kiosk ordering state machine
//!
//! ```text
//! welcome → modeSelection → categorySelection → subCategorySelection
//!         → foodSelection → ordering ⇄ payment → confirmation
//!                              └─ ADD_MORE → categorySelection
//! any open state ── CANCEL ──▶ cancelled
//! ```
//!
//! One [`KioskSession`] per customer. Events are applied one at a time
//! through [`reduce`]; `BACK` pops the history of states actually visited.

mod reducer;
mod state;

pub use reducer::{MachineError, MachineResult, reduce};
pub use state::{KioskContext, KioskEvent, KioskSnapshot, KioskState};

use std::collections::HashMap;

use shared::error::ErrorCode;
use shared::order::{CartLine, CheckoutResponse, merge_lines};

use crate::{ClientError, ClientResult, KioskClient};

/// Order created by an earlier checkout attempt, with the lines it was
/// created from
#[derive(Debug, Clone, PartialEq)]
struct PendingOrder {
    order_id: String,
    lines: Vec<CartLine>,
}

/// A single customer session
#[derive(Debug, Clone, Default)]
pub struct KioskSession {
    snapshot: KioskSnapshot,
    pending: Option<PendingOrder>,
}

impl KioskSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &KioskState {
        &self.snapshot.state
    }

    pub fn context(&self) -> &KioskContext {
        &self.snapshot.context
    }

    pub fn snapshot(&self) -> &KioskSnapshot {
        &self.snapshot
    }

    pub fn pending_order_id(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.order_id.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.snapshot.state.is_terminal()
    }

    /// Apply one event; on error the session is unchanged
    pub fn dispatch(&mut self, event: KioskEvent) -> MachineResult<&KioskState> {
        let from = self.snapshot.state.name();
        let event_name = event.name();
        match reduce(&self.snapshot, event) {
            Ok(next) => {
                self.snapshot = next;
                tracing::debug!(from, to = %self.snapshot.state, event = event_name, "Kiosk transition");
                Ok(&self.snapshot.state)
            }
            Err(e) => {
                tracing::debug!(state = from, event = event_name, error = %e, "Kiosk event rejected");
                Err(e)
            }
        }
    }

    /// Fresh session with empty context
    pub fn restart(&mut self) {
        *self = Self::default();
    }

    /// Move to `payment` and open the payment session on the server
    ///
    /// A first attempt creates the order. Once the server has reported an
    /// order id, later attempts with the same cart retry against that order,
    /// so a failed provider call never produces a second order. A cart edited
    /// since then starts a new order. Any failure returns the session to
    /// `ordering`.
    pub async fn checkout(&mut self, client: &KioskClient) -> ClientResult<CheckoutResponse> {
        self.dispatch(KioskEvent::Checkout)?;

        let items = merge_lines(&self.snapshot.context.cart);
        let result = match self.retry_target(&items) {
            Some(order_id) => client.retry_checkout(&order_id, items.clone()).await,
            None => {
                let mode = self.snapshot.context.mode.unwrap_or_default();
                client.submit_checkout(mode, items.clone()).await
            }
        };

        match result {
            Ok(resp) => {
                self.pending = Some(PendingOrder {
                    order_id: resp.order_id.clone(),
                    lines: items,
                });
                tracing::info!(order_id = %resp.order_id, counter = resp.counter, "Payment session opened");
                Ok(resp)
            }
            Err(e) => {
                if let ClientError::Api(err) = &e {
                    tracing::warn!(code = %err.code, message = %err.message, "Checkout failed");
                    self.note_failed_order(err.code, err.details.as_ref(), items);
                }
                self.dispatch(KioskEvent::PaymentFailed)?;
                Err(e)
            }
        }
    }

    /// Order to retry for `items`, dropping a pending order whose lines differ
    fn retry_target(&mut self, items: &[CartLine]) -> Option<String> {
        if let Some(pending) = self.pending.take_if(|p| p.lines != items) {
            tracing::info!(order_id = %pending.order_id, "Cart changed since last attempt, starting a new order");
        }
        self.pending.as_ref().map(|p| p.order_id.clone())
    }

    /// Remember or forget the server-side order after a failed attempt
    fn note_failed_order(
        &mut self,
        code: ErrorCode,
        details: Option<&HashMap<String, serde_json::Value>>,
        items: Vec<CartLine>,
    ) {
        match code {
            // 订单已存在，下次用同一订单重试
            ErrorCode::PaymentProviderError | ErrorCode::CheckoutInProgress => {
                if let Some(order_id) = details
                    .and_then(|d| d.get("order_id"))
                    .and_then(|v| v.as_str())
                {
                    self.pending = Some(PendingOrder {
                        order_id: order_id.to_string(),
                        lines: items,
                    });
                }
            }
            ErrorCode::OrderAbandoned | ErrorCode::CartMismatch => self.pending = None,
            _ => {}
        }
    }

    /// Provider reported success: show the ticket counter
    pub fn payment_succeeded(&mut self, resp: &CheckoutResponse) -> MachineResult<&KioskState> {
        self.dispatch(KioskEvent::PaymentSucceeded {
            order_id: resp.order_id.clone(),
            counter: resp.counter,
        })
    }
}
