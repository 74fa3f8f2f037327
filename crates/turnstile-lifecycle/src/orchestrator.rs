//! # Transition orchestrator
//!
//! Drives one lifecycle transition end to end:
//!
//! ```text
//! plan (precondition + compose) → sign & submit → extract effects
//!     → ensure success → [reconcile, purchases only] → advance local record
//! ```
//!
//! ## Guarantees
//!
//! - Precondition and composition failures are raised before anything is
//!   signed or submitted.
//! - A report with failure status leaves every caller-held record untouched
//!   and surfaces the ledger's cause as
//!   [`TurnstileError::LedgerExecutionFailure`].
//! - Local records are advanced at most once per successful report.
//! - Every error is a [`TransitionError`] naming the transition and asset.
//!
//! The orchestrator holds no state between calls and never retries.

use serde::Serialize;
use turnstile_compose::verify_purchase_shape;
use turnstile_effects::{
    BalanceSnapshot, Reconciler, Reconciliation, SpendExpectation, TagMatcher, TypedEffects,
    extract,
};
use turnstile_types::{
    Address, BatchDigest, Event, ObjectId, ProtocolConfig, Result, Ticket, TicketClass,
    Transition, TransitionError, TurnstileError,
};

use crate::ledger::{LedgerClient, ReportOptions, Signer};
use crate::planner::{
    EscrowHandle, NewEvent, TransitionPlan, plan_buy_and_approve, plan_check_in,
    plan_create_class, plan_create_escrow, plan_create_event, plan_list, plan_mint,
};

/// Result alias for orchestrated transitions.
pub type TransitionResult<T> = std::result::Result<T, TransitionError>;

/// Proof that a transition took effect on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReceipt {
    pub transition: Transition,
    pub asset: Option<ObjectId>,
    /// Digest of the submitted batch.
    pub batch_digest: BatchDigest,
    /// Ledger-assigned transaction digest, when reported.
    pub ledger_digest: Option<String>,
    pub network_fee: u64,
}

/// A completed purchase plus its settlement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub receipt: TransitionReceipt,
    pub reconciliation: Reconciliation,
}

/// Parameters of a `buyAndApprove`.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseOrder<'p> {
    pub class: &'p TicketClass,
    pub payment: u64,
    pub policy_id: &'p ObjectId,
}

/// Executes lifecycle transitions against a [`LedgerClient`].
pub struct Orchestrator<'a, L: ?Sized> {
    config: &'a ProtocolConfig,
    ledger: &'a L,
    options: ReportOptions,
}

impl<'a, L: LedgerClient + ?Sized> Orchestrator<'a, L> {
    pub fn new(config: &'a ProtocolConfig, ledger: &'a L) -> Self {
        Self {
            config,
            ledger,
            options: ReportOptions::default(),
        }
    }

    #[must_use]
    pub fn with_report_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    /// Sign and submit a plan, returning the effects of a successful report.
    ///
    /// Exposed for callers that compose their own plans; it does not touch
    /// any local record. Purchase plans are held to the same shape check as
    /// planner-built ones.
    ///
    /// # Errors
    /// - [`TurnstileError::PolicyNotConfirmed`] if a purchase batch does not
    ///   confirm its transfer policy (nothing is submitted)
    /// - [`TurnstileError::LedgerUnavailable`] or signing errors from the collaborators
    /// - [`TurnstileError::MalformedReport`] if the report has no status
    /// - [`TurnstileError::LedgerExecutionFailure`] if the ledger reports failure
    pub fn submit(&self, plan: &TransitionPlan, signer: &dyn Signer) -> Result<TypedEffects> {
        self.submit_with(plan, signer, self.options)
    }

    /// Submit a transition whose result is read back from created objects.
    /// Object changes are always requested so that a successful ledger
    /// transition can be mirrored locally.
    fn submit_reading_ids(&self, plan: &TransitionPlan, signer: &dyn Signer) -> Result<TypedEffects> {
        let options = ReportOptions {
            show_object_changes: true,
            ..self.options
        };
        self.submit_with(plan, signer, options)
    }

    fn submit_with(
        &self,
        plan: &TransitionPlan,
        signer: &dyn Signer,
        options: ReportOptions,
    ) -> Result<TypedEffects> {
        let purchase_target = self.config.framework_target(&self.config.targets.purchase);
        if plan.transition == Transition::BuyAndApprove
            || plan.batch.position_of_call(&purchase_target).is_some()
        {
            verify_purchase_shape(&plan.batch, self.config)?;
        }

        let digest = plan.batch.digest();
        tracing::debug!(
            transition = %plan.transition,
            asset = ?plan.asset,
            batch = %digest.short(),
            ops = plan.batch.len(),
            "Submitting batch"
        );
        let report = self.ledger.submit(&plan.batch, signer, options)?;
        let effects = extract(&report)?;
        if let Err(e) = effects.ensure_success() {
            tracing::warn!(
                transition = %plan.transition,
                asset = ?plan.asset,
                batch = %digest.short(),
                error = %e,
                "Ledger rejected batch; local state unchanged"
            );
            return Err(e);
        }
        Ok(effects)
    }

    fn receipt(plan: &TransitionPlan, effects: &TypedEffects) -> TransitionReceipt {
        let receipt = TransitionReceipt {
            transition: plan.transition,
            asset: plan.asset.clone(),
            batch_digest: plan.batch.digest(),
            ledger_digest: effects.digest.clone(),
            network_fee: effects.network_fee,
        };
        tracing::info!(
            transition = %receipt.transition,
            asset = ?receipt.asset,
            batch = %receipt.batch_digest.short(),
            fee = receipt.network_fee,
            "Transition completed"
        );
        receipt
    }

    fn first_created(
        effects: &TypedEffects,
        ids: Vec<&ObjectId>,
        what: &str,
    ) -> Result<ObjectId> {
        ids.into_iter().next().cloned().ok_or_else(|| {
            TurnstileError::malformed(format!(
                "successful report {} lists no created {what}",
                effects.digest.as_deref().unwrap_or("<no digest>")
            ))
        })
    }

    // -----------------------------------------------------------------
    // Organizer setup
    // -----------------------------------------------------------------

    pub fn create_event(&self, signer: &dyn Signer, event: &NewEvent) -> TransitionResult<Event> {
        let wrap = |e| TransitionError::new(Transition::CreateEvent, None, e);
        let plan = plan_create_event(self.config, event).map_err(wrap)?;
        let effects = self.submit_reading_ids(&plan, signer).map_err(wrap)?;
        let id = Self::first_created(
            &effects,
            effects.created_events(&self.config.type_tags),
            "event",
        )
        .map_err(wrap)?;
        Self::receipt(&plan, &effects);
        Ok(Event {
            id,
            name: event.name.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            poster_ref: event.poster_ref.clone(),
            organizer: signer.address().clone(),
        })
    }

    pub fn create_class(
        &self,
        signer: &dyn Signer,
        event: &Event,
        face_price: u64,
        supply: u64,
    ) -> TransitionResult<TicketClass> {
        let wrap = |e| TransitionError::new(Transition::CreateClass, Some(&event.id), e);
        let plan = plan_create_class(self.config, event, face_price, supply).map_err(wrap)?;
        let effects = self.submit_reading_ids(&plan, signer).map_err(wrap)?;
        let id = Self::first_created(
            &effects,
            effects.created_classes(&self.config.type_tags),
            "ticket class",
        )
        .map_err(wrap)?;
        Self::receipt(&plan, &effects);
        Ok(TicketClass {
            id,
            event_id: event.id.clone(),
            face_price,
            supply,
            issued: 0,
        })
    }

    pub fn create_escrow(&self, signer: &dyn Signer) -> TransitionResult<EscrowHandle> {
        let wrap = |e| TransitionError::new(Transition::CreateEscrow, None, e);
        let plan = plan_create_escrow(self.config).map_err(wrap)?;
        let effects = self.submit_reading_ids(&plan, signer).map_err(wrap)?;
        let tags = &self.config.type_tags;
        let escrow_id =
            Self::first_created(&effects, effects.created_escrows(tags), "escrow").map_err(wrap)?;
        let cap_id = Self::first_created(
            &effects,
            effects.created_matching(TagMatcher::StructName(&tags.escrow_cap)),
            "escrow capability",
        )
        .map_err(wrap)?;
        Self::receipt(&plan, &effects);
        Ok(EscrowHandle { escrow_id, cap_id })
    }

    // -----------------------------------------------------------------
    // Ticket transitions
    // -----------------------------------------------------------------

    /// Mint one ticket of `class` to the signer. `class.issued` is
    /// incremented only after the ledger reports success.
    pub fn mint(&self, signer: &dyn Signer, class: &mut TicketClass) -> TransitionResult<Ticket> {
        let wrap = |e| TransitionError::new(Transition::Mint, None, e);
        let plan = plan_mint(self.config, class).map_err(wrap)?;
        let effects = self.submit_reading_ids(&plan, signer).map_err(wrap)?;
        let id = Self::first_created(
            &effects,
            effects.created_tickets(&self.config.type_tags),
            "ticket",
        )
        .map_err(wrap)?;
        class.record_issue().map_err(wrap)?;
        Self::receipt(&plan, &effects);
        Ok(Ticket::minted(id, class.id.clone(), signer.address().clone()))
    }

    pub fn list(
        &self,
        signer: &dyn Signer,
        ticket: &mut Ticket,
        escrow: &EscrowHandle,
    ) -> TransitionResult<TransitionReceipt> {
        let asset = ticket.id.clone();
        let wrap = |e| TransitionError::new(Transition::List, Some(&asset), e);
        let plan = plan_list(self.config, ticket, signer.address(), escrow).map_err(wrap)?;
        let effects = self.submit(&plan, signer).map_err(wrap)?;
        ticket.mark_listed(escrow.escrow_id.clone()).map_err(wrap)?;
        Ok(Self::receipt(&plan, &effects))
    }

    /// Buy a listed ticket for the signer, clearing the transfer policy in
    /// the same batch.
    ///
    /// The buyer's balance is snapshotted before submission and the
    /// settlement reconciled afterwards. A conservation or spend violation
    /// is returned as an error and the ticket record is left as it was.
    pub fn buy_and_approve(
        &self,
        signer: &dyn Signer,
        ticket: &mut Ticket,
        order: PurchaseOrder<'_>,
    ) -> TransitionResult<PurchaseReceipt> {
        let asset = ticket.id.clone();
        let wrap = |e| TransitionError::new(Transition::BuyAndApprove, Some(&asset), e);
        let buyer = signer.address();
        let plan = plan_buy_and_approve(
            self.config,
            ticket,
            order.class,
            order.payment,
            order.policy_id,
            buyer,
        )
        .map_err(wrap)?;

        let pre = BalanceSnapshot {
            address: buyer.clone(),
            balance: self.ledger.get_balance(buyer, None).map_err(wrap)?,
        };
        let effects = self.submit(&plan, signer).map_err(wrap)?;
        check_new_owner(&effects, &asset, buyer).map_err(wrap)?;
        let reconciliation = Reconciler::new(self.config)
            .reconcile(&pre, &effects, SpendExpectation::sale(order.payment))
            .map_err(wrap)?;

        ticket.mark_sold(buyer.clone()).map_err(wrap)?;
        Ok(PurchaseReceipt {
            receipt: Self::receipt(&plan, &effects),
            reconciliation,
        })
    }

    /// Mark an owned ticket used. The ledger enforces once-only; a second
    /// submission comes back as [`TurnstileError::LedgerExecutionFailure`].
    pub fn check_in(
        &self,
        signer: &dyn Signer,
        ticket: &mut Ticket,
    ) -> TransitionResult<TransitionReceipt> {
        let asset = ticket.id.clone();
        let wrap = |e| TransitionError::new(Transition::CheckIn, Some(&asset), e);
        let plan = plan_check_in(self.config, ticket).map_err(wrap)?;
        let effects = self.submit(&plan, signer).map_err(wrap)?;
        ticket.mark_used().map_err(wrap)?;
        Ok(Self::receipt(&plan, &effects))
    }
}

/// A purchased ticket must end up with the buyer if the report says where it went.
fn check_new_owner(effects: &TypedEffects, asset: &ObjectId, buyer: &Address) -> Result<()> {
    match effects.new_owner_of(asset) {
        Some(owner) if owner != buyer => Err(TurnstileError::malformed(format!(
            "purchased ticket {asset} reported owned by {owner}, expected {buyer}"
        ))),
        _ => Ok(()),
    }
}
