//! Lifecycle planner: the ticket state machine.
//!
//! Each `plan_*` function checks the transition's precondition against the
//! caller-supplied records and, only if it holds, composes the batch that
//! implements the transition. A failed precondition never produces a batch.
//!
//! | Transition      | Precondition                          | Batch                               |
//! |-----------------|---------------------------------------|-------------------------------------|
//! | `mint`          | `issued < supply`                     | `mint_ticket(class)`                |
//! | `list`          | `Minted`, caller is holder            | `kiosk::place(escrow, cap, ticket)` |
//! | `buyAndApprove` | `Listed`, payment ≥ face price        | split, purchase, confirm, transfer  |
//! | `checkIn`       | `Owned`, `used == false`              | `check_in(ticket)`                  |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turnstile_compose::{
    Argument, Batch, Operation, PurchaseRequest, build_purchase_batch, compose,
    verify_purchase_shape,
};
use turnstile_types::constants::{FN_CHECK_IN, FN_CREATE_CLASS, FN_CREATE_EVENT, FN_MINT};
use turnstile_types::{
    Address, Event, ObjectId, ProtocolConfig, Result, Ticket, TicketClass, TicketState,
    Transition, TurnstileError,
};

/// A composed batch together with the transition it implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub transition: Transition,
    /// The existing asset acted on. `None` when the batch creates it.
    pub asset: Option<ObjectId>,
    pub batch: Batch,
}

/// Organizer input for a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub poster_ref: String,
}

/// An escrow and the capability that authorises placing into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowHandle {
    pub escrow_id: ObjectId,
    pub cap_id: ObjectId,
}

fn plan(
    config: &ProtocolConfig,
    transition: Transition,
    asset: Option<&ObjectId>,
    operations: Vec<Operation>,
) -> Result<TransitionPlan> {
    let batch = compose(operations, config.gas_budget)?;
    Ok(TransitionPlan {
        transition,
        asset: asset.cloned(),
        batch,
    })
}

fn timestamp_ms(at: DateTime<Utc>) -> Result<u64> {
    u64::try_from(at.timestamp_millis()).map_err(|_| {
        TurnstileError::invalid_argument(format!("timestamp {at} precedes the Unix epoch"))
    })
}

fn require_state(ticket: &Ticket, transition: Transition) -> Result<()> {
    match transition.required_state() {
        Some(required) if ticket.state != required => Err(TurnstileError::IllegalTransition {
            transition,
            from: ticket.state,
        }),
        _ => Ok(()),
    }
}

/// # Errors
/// Returns [`TurnstileError::InvalidArgument`] for a blank name or an event
/// that does not end after it starts.
pub fn plan_create_event(config: &ProtocolConfig, event: &NewEvent) -> Result<TransitionPlan> {
    if event.name.trim().is_empty() {
        return Err(TurnstileError::invalid_argument("event name must not be empty"));
    }
    if event.ends_at <= event.starts_at {
        return Err(TurnstileError::invalid_argument(format!(
            "event must end after it starts ({} <= {})",
            event.ends_at, event.starts_at
        )));
    }
    let op = Operation::call(
        config.ticketing_target(FN_CREATE_EVENT),
        Vec::new(),
        vec![
            Argument::string(event.name.clone()),
            Argument::u64(timestamp_ms(event.starts_at)?),
            Argument::u64(timestamp_ms(event.ends_at)?),
            Argument::string(event.poster_ref.clone()),
        ],
        0,
    );
    plan(config, Transition::CreateEvent, None, vec![op])
}

/// # Errors
/// Returns [`TurnstileError::InvalidArgument`] for a zero supply.
pub fn plan_create_class(
    config: &ProtocolConfig,
    event: &Event,
    face_price: u64,
    supply: u64,
) -> Result<TransitionPlan> {
    if supply == 0 {
        return Err(TurnstileError::invalid_argument("ticket class supply must be > 0"));
    }
    let op = Operation::call(
        config.ticketing_target(FN_CREATE_CLASS),
        Vec::new(),
        vec![
            Argument::Object(event.id.clone()),
            Argument::u64(face_price),
            Argument::u64(supply),
        ],
        0,
    );
    plan(config, Transition::CreateClass, None, vec![op])
}

pub fn plan_create_escrow(config: &ProtocolConfig) -> Result<TransitionPlan> {
    let op = Operation::call(
        config.framework_target(&config.targets.create_escrow),
        Vec::new(),
        Vec::new(),
        0,
    );
    plan(config, Transition::CreateEscrow, None, vec![op])
}

/// # Errors
/// Returns [`TurnstileError::SupplyExhausted`] when every ticket of the
/// class has been issued.
pub fn plan_mint(config: &ProtocolConfig, class: &TicketClass) -> Result<TransitionPlan> {
    if !class.has_capacity() {
        return Err(TurnstileError::SupplyExhausted {
            class: class.id.clone(),
            supply: class.supply,
        });
    }
    let op = Operation::call(
        config.ticketing_target(FN_MINT),
        Vec::new(),
        vec![Argument::Object(class.id.clone())],
        0,
    );
    plan(config, Transition::Mint, None, vec![op])
}

/// # Errors
/// - [`TurnstileError::IllegalTransition`] unless the ticket is `Minted`
/// - [`TurnstileError::NotHolder`] if `caller` does not hold the ticket
pub fn plan_list(
    config: &ProtocolConfig,
    ticket: &Ticket,
    caller: &Address,
    escrow: &EscrowHandle,
) -> Result<TransitionPlan> {
    require_state(ticket, Transition::List)?;
    if &ticket.holder != caller {
        return Err(TurnstileError::NotHolder {
            caller: caller.clone(),
            holder: ticket.holder.clone(),
        });
    }
    let op = Operation::call(
        config.framework_target(&config.targets.place),
        vec![config.ticket_type()],
        vec![
            Argument::Object(escrow.escrow_id.clone()),
            Argument::Object(escrow.cap_id.clone()),
            Argument::Object(ticket.id.clone()),
        ],
        0,
    );
    plan(config, Transition::List, Some(&ticket.id), vec![op])
}

/// # Errors
/// - [`TurnstileError::IllegalTransition`] unless the ticket is `Listed`
/// - [`TurnstileError::InvalidArgument`] if `class` is not the ticket's class
/// - [`TurnstileError::InsufficientPayment`] if `payment` is below face price
/// - [`TurnstileError::InvalidArgument`] if the ticket has no recorded escrow
/// - [`TurnstileError::PolicyNotConfirmed`] if the composed batch fails shape verification
pub fn plan_buy_and_approve(
    config: &ProtocolConfig,
    ticket: &Ticket,
    class: &TicketClass,
    payment: u64,
    policy_id: &ObjectId,
    buyer: &Address,
) -> Result<TransitionPlan> {
    require_state(ticket, Transition::BuyAndApprove)?;
    if ticket.class_id != class.id {
        return Err(TurnstileError::invalid_argument(format!(
            "ticket {} belongs to class {}, not {}",
            ticket.id, ticket.class_id, class.id
        )));
    }
    if payment < class.face_price {
        return Err(TurnstileError::InsufficientPayment {
            needed: class.face_price,
            offered: payment,
        });
    }
    let Some(escrow_id) = ticket.escrow.clone() else {
        return Err(TurnstileError::invalid_argument(format!(
            "listed ticket {} has no escrow recorded",
            ticket.id
        )));
    };
    let batch = build_purchase_batch(
        config,
        PurchaseRequest {
            escrow_id,
            asset_id: ticket.id.clone(),
            price: payment,
            policy_id: policy_id.clone(),
            buyer: buyer.clone(),
        },
    )?;
    verify_purchase_shape(&batch, config)?;
    Ok(TransitionPlan {
        transition: Transition::BuyAndApprove,
        asset: Some(ticket.id.clone()),
        batch,
    })
}

/// # Errors
/// - [`TurnstileError::AlreadyCheckedIn`] if the ticket is already used
/// - [`TurnstileError::IllegalTransition`] unless the ticket is `Owned`
pub fn plan_check_in(config: &ProtocolConfig, ticket: &Ticket) -> Result<TransitionPlan> {
    if ticket.used || ticket.state == TicketState::CheckedIn {
        return Err(TurnstileError::AlreadyCheckedIn(ticket.id.clone()));
    }
    require_state(ticket, Transition::CheckIn)?;
    let op = Operation::call(
        config.ticketing_target(FN_CHECK_IN),
        Vec::new(),
        vec![Argument::Object(ticket.id.clone())],
        0,
    );
    plan(config, Transition::CheckIn, Some(&ticket.id), vec![op])
}
