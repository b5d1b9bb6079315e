//! Pure transition function
//!
//! `reduce(snapshot, event)` never mutates its input. A rejected event
//! returns an error and the caller keeps the old snapshot.

use shared::order::{CartLine, MAX_LINE_QUANTITY};
use thiserror::Error;

use super::state::{KioskEvent, KioskSnapshot, KioskState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("Event {event} not accepted in state {state}")]
    EventRejected {
        state: &'static str,
        event: &'static str,
    },

    #[error("Session already finished in state {0}")]
    SessionFinished(&'static str),

    #[error("Nothing to go back to")]
    EmptyHistory,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Food {0} is not in the cart")]
    NotInCart(String),

    #[error("Quantity {0} out of range")]
    InvalidQuantity(i32),
}

pub type MachineResult<T> = Result<T, MachineError>;

/// Apply one event to a snapshot
pub fn reduce(snapshot: &KioskSnapshot, event: KioskEvent) -> MachineResult<KioskSnapshot> {
    if snapshot.state.is_terminal() {
        return Err(MachineError::SessionFinished(snapshot.state.name()));
    }

    let mut next = snapshot.clone();
    let rejected = MachineError::EventRejected {
        state: snapshot.state.name(),
        event: event.name(),
    };

    match (&snapshot.state, event) {
        (_, KioskEvent::Cancel) => {
            next.state = KioskState::Cancelled;
            next.history.clear();
        }

        (KioskState::Welcome, KioskEvent::StartOrder) => {
            advance(&mut next, KioskState::ModeSelection);
        }

        (KioskState::ModeSelection, KioskEvent::SelectMode { mode }) => {
            next.context.mode = Some(mode);
            advance(&mut next, KioskState::CategorySelection);
        }

        (KioskState::CategorySelection, KioskEvent::SelectCategory { category_id }) => {
            // 换了分类，旧的子分类不再有效
            if next.context.current_category_id.as_deref() != Some(category_id.as_str()) {
                next.context.current_sub_category_id = None;
            }
            next.context.current_category_id = Some(category_id);
            advance(&mut next, KioskState::SubCategorySelection);
        }

        (KioskState::SubCategorySelection, KioskEvent::SelectSubCategory { sub_category_id }) => {
            next.context.current_sub_category_id = Some(sub_category_id);
            advance(&mut next, KioskState::FoodSelection);
        }

        (KioskState::FoodSelection, KioskEvent::SelectFood { food_id }) => {
            add_to_cart(&mut next.context.cart, food_id)?;
            advance(&mut next, KioskState::Ordering);
        }

        (KioskState::Ordering, KioskEvent::AddMore) => {
            advance(&mut next, KioskState::CategorySelection);
        }

        (KioskState::Ordering, KioskEvent::SetQuantity { food_id, quantity }) => {
            set_quantity(&mut next.context.cart, &food_id, quantity)?;
        }

        (KioskState::Ordering, KioskEvent::RemoveFromCart { food_id }) => {
            set_quantity(&mut next.context.cart, &food_id, 0)?;
        }

        (KioskState::Ordering, KioskEvent::Checkout) => {
            if next.context.cart.is_empty() {
                return Err(MachineError::EmptyCart);
            }
            advance(&mut next, KioskState::Payment);
        }

        (KioskState::Payment, KioskEvent::PaymentSucceeded { order_id, counter }) => {
            next.state = KioskState::Confirmation { order_id, counter };
            next.history.clear();
        }

        (KioskState::Payment, KioskEvent::PaymentFailed) => {
            // Checkout pushed `ordering`, drop it with the return
            if next.history.last() == Some(&KioskState::Ordering) {
                next.history.pop();
            }
            next.state = KioskState::Ordering;
        }

        // The provider owns the payment step
        (KioskState::Payment, KioskEvent::Back) => return Err(rejected),

        (_, KioskEvent::Back) => {
            next.state = next.history.pop().ok_or(MachineError::EmptyHistory)?;
        }

        _ => return Err(rejected),
    }

    Ok(next)
}

/// Forward transition: remember where we came from
fn advance(snapshot: &mut KioskSnapshot, to: KioskState) {
    let from = std::mem::replace(&mut snapshot.state, to);
    snapshot.history.push(from);
}

fn add_to_cart(cart: &mut Vec<CartLine>, food_id: String) -> MachineResult<()> {
    match cart.iter_mut().find(|l| l.food_id == food_id) {
        Some(line) if line.quantity >= MAX_LINE_QUANTITY => {
            Err(MachineError::InvalidQuantity(line.quantity + 1))
        }
        Some(line) => {
            line.quantity += 1;
            Ok(())
        }
        None => {
            cart.push(CartLine::new(food_id, 1));
            Ok(())
        }
    }
}

fn set_quantity(cart: &mut Vec<CartLine>, food_id: &str, quantity: i32) -> MachineResult<()> {
    if !(0..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(MachineError::InvalidQuantity(quantity));
    }
    let pos = cart
        .iter()
        .position(|l| l.food_id == food_id)
        .ok_or_else(|| MachineError::NotInCart(food_id.to_string()))?;

    if quantity == 0 {
        cart.remove(pos);
    } else {
        cart[pos].quantity = quantity;
    }
    Ok(())
}
