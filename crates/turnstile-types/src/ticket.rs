//! # Ticket data model
//!
//! Local, caller-held views of the on-ledger objects that make up a ticketed
//! event. Turnstile keeps no state of its own between calls: callers pass
//! these records in and receive updated copies only after the ledger reports
//! success.
//!
//! ## Ticket state machine
//!
//! ```text
//!   ┌────────┐  list   ┌────────┐  buyAndApprove  ┌───────┐  checkIn  ┌───────────┐
//!   │ MINTED ├────────▶│ LISTED ├────────────────▶│ OWNED ├──────────▶│ CHECKED_IN│
//!   └────────┘         └────────┘                 └───────┘           └───────────┘
//! ```
//!
//! `CheckedIn` is terminal. `Owned` may be the last state a ticket ever
//! reaches.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, ObjectId, Result, TurnstileError};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A real-world occurrence. Created once by its organizer; immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: ObjectId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Off-chain poster reference (URL or content hash). Opaque to the core.
    pub poster_ref: String,
    pub organizer: Address,
}

// ---------------------------------------------------------------------------
// TicketClass
// ---------------------------------------------------------------------------

/// Template for the tickets of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClass {
    pub id: ObjectId,
    pub event_id: ObjectId,
    /// Face price in the ledger's minor unit.
    pub face_price: u64,
    pub supply: u64,
    /// Monotonic; incremented by each successful mint.
    pub issued: u64,
}

impl TicketClass {
    /// Tickets that can still be minted.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.supply.saturating_sub(self.issued)
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.issued < self.supply
    }

    /// Record one successful mint.
    ///
    /// # Errors
    /// Returns [`TurnstileError::SupplyExhausted`] if the class is already full.
    pub fn record_issue(&mut self) -> Result<()> {
        if !self.has_capacity() {
            return Err(TurnstileError::SupplyExhausted {
                class: self.id.clone(),
                supply: self.supply,
            });
        }
        self.issued += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TicketState
// ---------------------------------------------------------------------------

/// Lifecycle state of a single ticket.
///
/// Transitions are **monotonic**: a ticket never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketState {
    /// Held by the issuer.
    Minted,
    /// Held in escrow; not independently transferable.
    Listed,
    /// Held by a purchaser; escrow released.
    Owned,
    /// `used = true`. Terminal.
    CheckedIn,
}

impl TicketState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Minted, Self::Listed)
                | (Self::Listed, Self::Owned)
                | (Self::Owned, Self::CheckedIn)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CheckedIn)
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minted => write!(f, "MINTED"),
            Self::Listed => write!(f, "LISTED"),
            Self::Owned => write!(f, "OWNED"),
            Self::CheckedIn => write!(f, "CHECKED_IN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// The tradeable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: ObjectId,
    pub class_id: ObjectId,
    /// Write-once `false → true`.
    pub used: bool,
    /// Current holder. While listed this is the seller who placed it in escrow.
    pub holder: Address,
    pub state: TicketState,
    /// Escrow currently holding the ticket, set only while `Listed`.
    pub escrow: Option<ObjectId>,
}

impl Ticket {
    /// A freshly minted ticket held by `issuer`.
    #[must_use]
    pub fn minted(id: ObjectId, class_id: ObjectId, issuer: Address) -> Self {
        Self {
            id,
            class_id,
            used: false,
            holder: issuer,
            state: TicketState::Minted,
            escrow: None,
        }
    }

    fn advance(&mut self, target: TicketState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(TurnstileError::InvalidTicketState {
                ticket: self.id.clone(),
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        Ok(())
    }

    /// Record that the ticket was placed into `escrow`.
    ///
    /// # Errors
    /// Returns [`TurnstileError::InvalidTicketState`] unless the ticket is `Minted`.
    pub fn mark_listed(&mut self, escrow: ObjectId) -> Result<()> {
        self.advance(TicketState::Listed)?;
        self.escrow = Some(escrow);
        Ok(())
    }

    /// Record a completed purchase by `buyer`.
    ///
    /// # Errors
    /// Returns [`TurnstileError::InvalidTicketState`] unless the ticket is `Listed`.
    pub fn mark_sold(&mut self, buyer: Address) -> Result<()> {
        self.advance(TicketState::Owned)?;
        self.holder = buyer;
        self.escrow = None;
        Ok(())
    }

    /// Record a check-in. `used` flips exactly once.
    ///
    /// # Errors
    /// - [`TurnstileError::AlreadyCheckedIn`] if `used` is already set
    /// - [`TurnstileError::InvalidTicketState`] unless the ticket is `Owned`
    pub fn mark_used(&mut self) -> Result<()> {
        if self.used {
            return Err(TurnstileError::AlreadyCheckedIn(self.id.clone()));
        }
        self.advance(TicketState::CheckedIn)?;
        self.used = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A state-machine-governed change, or an organizer setup operation.
///
/// Each variant is implemented by exactly one batch shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    CreateEvent,
    CreateClass,
    CreateEscrow,
    Mint,
    List,
    BuyAndApprove,
    CheckIn,
}

impl Transition {
    /// The ticket state this transition requires, if it acts on a ticket.
    #[must_use]
    pub fn required_state(&self) -> Option<TicketState> {
        match self {
            Self::List => Some(TicketState::Minted),
            Self::BuyAndApprove => Some(TicketState::Listed),
            Self::CheckIn => Some(TicketState::Owned),
            Self::CreateEvent | Self::CreateClass | Self::CreateEscrow | Self::Mint => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateEvent => write!(f, "createEvent"),
            Self::CreateClass => write!(f, "createClass"),
            Self::CreateEscrow => write!(f, "createEscrow"),
            Self::Mint => write!(f, "mint"),
            Self::List => write!(f, "list"),
            Self::BuyAndApprove => write!(f, "buyAndApprove"),
            Self::CheckIn => write!(f, "checkIn"),
        }
    }
}
