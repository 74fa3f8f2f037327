//! Escrow & policy coordination for purchases.
//!
//! Buying a listed ticket takes three steps that must land in one batch:
//!
//! ```text
//!   split price off gas coin
//!        │ coin
//!        ▼
//!   withdraw from escrow ──▶ (asset, transfer request)
//!                                  │            │
//!                                  │            ▼
//!                                  │   confirm request against policy
//!                                  ▼
//!                          transfer asset to buyer
//! ```
//!
//! A transfer request that is never confirmed strands the asset, so the
//! builder below is a typestate: [`PurchaseBatchBuilder::finish`] only
//! exists once the confirm step has run and the asset has been delivered.
//! Batches that did not come from this builder can be checked with
//! [`verify_purchase_shape`].

use turnstile_types::{Address, ObjectId, ProtocolConfig, Result, TurnstileError};

use crate::batch::{Argument, Batch, BatchBuilder, Operation, Target, ValueRef};

/// Inputs of a purchase. All ids are opaque; only presence is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub escrow_id: ObjectId,
    pub asset_id: ObjectId,
    /// Price in minor units. Must be > 0.
    pub price: u64,
    pub policy_id: ObjectId,
    pub buyer: Address,
}

impl PurchaseRequest {
    /// # Errors
    /// Returns [`TurnstileError::InvalidArgument`] for a zero price or blank id.
    pub fn validate(&self) -> Result<()> {
        if self.price == 0 {
            return Err(TurnstileError::invalid_argument("purchase price must be > 0"));
        }
        for (name, blank) in [
            ("escrow id", self.escrow_id.is_empty()),
            ("asset id", self.asset_id.is_empty()),
            ("policy id", self.policy_id.is_empty()),
            ("buyer address", self.buyer.is_empty()),
        ] {
            if blank {
                return Err(TurnstileError::invalid_argument(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

// Typestate stages.

/// Nothing pushed yet.
#[derive(Debug)]
pub struct Start;

/// Asset withdrawn; its transfer request is outstanding.
#[derive(Debug)]
pub struct Withdrawn {
    asset: ValueRef,
    transfer_request: ValueRef,
}

/// Transfer request confirmed; asset ready to deliver.
#[derive(Debug)]
pub struct Confirmed {
    asset: ValueRef,
}

/// Asset delivered to the buyer.
#[derive(Debug)]
pub struct Delivered;

/// Builds the purchase sequence in the only order the policy accepts.
#[derive(Debug)]
pub struct PurchaseBatchBuilder<'a, S> {
    config: &'a ProtocolConfig,
    request: PurchaseRequest,
    builder: BatchBuilder,
    stage: S,
}

impl<'a, S> PurchaseBatchBuilder<'a, S> {
    fn advance<T>(self, stage: T) -> PurchaseBatchBuilder<'a, T> {
        PurchaseBatchBuilder {
            config: self.config,
            request: self.request,
            builder: self.builder,
            stage,
        }
    }

    #[must_use]
    pub fn request(&self) -> &PurchaseRequest {
        &self.request
    }
}

impl<'a> PurchaseBatchBuilder<'a, Start> {
    /// # Errors
    /// Returns [`TurnstileError::InvalidArgument`] if the request is invalid.
    pub fn new(config: &'a ProtocolConfig, request: PurchaseRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            config,
            request,
            builder: BatchBuilder::new(config.gas_budget),
            stage: Start,
        })
    }

    /// Split the payment off the gas coin and withdraw the asset from escrow.
    pub fn withdraw(mut self) -> Result<PurchaseBatchBuilder<'a, Withdrawn>> {
        let payment = self
            .builder
            .push(Operation::split_coins(Argument::GasCoin, &[self.request.price]))?;
        let purchase = self.builder.push(Operation::call(
            self.config.framework_target(&self.config.targets.purchase),
            vec![self.config.ticket_type()],
            vec![
                Argument::Object(self.request.escrow_id.clone()),
                Argument::id(self.request.asset_id.clone()),
                Argument::Move(payment.output(0)),
            ],
            2,
        ))?;
        let stage = Withdrawn {
            asset: purchase.output(0),
            transfer_request: purchase.output(1),
        };
        Ok(self.advance(stage))
    }
}

impl<'a> PurchaseBatchBuilder<'a, Withdrawn> {
    /// Consume the transfer request against the transfer policy.
    pub fn confirm(mut self) -> Result<PurchaseBatchBuilder<'a, Confirmed>> {
        self.builder.push(Operation::call(
            self.config.framework_target(&self.config.targets.confirm),
            vec![self.config.ticket_type()],
            vec![
                Argument::Object(self.request.policy_id.clone()),
                Argument::Move(self.stage.transfer_request),
            ],
            0,
        ))?;
        let asset = self.stage.asset;
        Ok(self.advance(Confirmed { asset }))
    }
}

impl<'a> PurchaseBatchBuilder<'a, Confirmed> {
    pub fn transfer_to_buyer(mut self) -> Result<PurchaseBatchBuilder<'a, Delivered>> {
        self.builder.push(Operation::transfer_objects(
            vec![Argument::Move(self.stage.asset)],
            self.request.buyer.clone(),
        ))?;
        Ok(self.advance(Delivered))
    }
}

impl PurchaseBatchBuilder<'_, Delivered> {
    pub fn finish(self) -> Result<Batch> {
        self.builder.finish()
    }
}

/// Compose the full purchase batch in one call.
///
/// # Errors
/// Returns [`TurnstileError::InvalidArgument`] for a zero price or blank id.
pub fn build_purchase_batch(config: &ProtocolConfig, request: PurchaseRequest) -> Result<Batch> {
    PurchaseBatchBuilder::new(config, request)?
        .withdraw()?
        .confirm()?
        .transfer_to_buyer()?
        .finish()
}

/// Check that a batch performing an escrow withdrawal confirms the transfer
/// request before the withdrawn asset is transferred.
///
/// Accepts exactly one withdrawal, followed by exactly one confirm that
/// consumes the withdrawal's transfer request, followed by a transfer that
/// consumes the withdrawn asset.
///
/// # Errors
/// Returns [`TurnstileError::PolicyNotConfirmed`] describing the first
/// violation found.
pub fn verify_purchase_shape(batch: &Batch, config: &ProtocolConfig) -> Result<()> {
    let not_confirmed = |reason: &str| {
        Err(TurnstileError::PolicyNotConfirmed {
            reason: reason.to_string(),
        })
    };
    let purchase_target = config.framework_target(&config.targets.purchase);
    let confirm_target = config.framework_target(&config.targets.confirm);
    let ops = batch.operations();

    let withdraws: Vec<usize> = positions(ops, |op| op.target.is_call_to(&purchase_target));
    let [withdraw] = withdraws[..] else {
        return not_confirmed("purchase batch must contain exactly one escrow withdrawal");
    };
    let asset = ValueRef {
        operation: withdraw,
        output: 0,
    };
    let transfer_request = ValueRef {
        operation: withdraw,
        output: 1,
    };

    let confirms: Vec<usize> = positions(ops, |op| op.target.is_call_to(&confirm_target));
    let [confirm] = confirms[..] else {
        return not_confirmed("purchase batch must contain exactly one transfer confirmation");
    };
    if confirm < withdraw {
        return not_confirmed("confirmation precedes the escrow withdrawal");
    }
    if !ops[confirm].moves(transfer_request) {
        return not_confirmed("confirmation does not consume the withdrawal's transfer request");
    }

    let Some(transfer) = ops
        .iter()
        .position(|op| op.target == Target::TransferObjects && op.moves(asset))
    else {
        return not_confirmed("withdrawn asset is never transferred");
    };
    if transfer < confirm {
        return not_confirmed("asset is transferred before the transfer request is confirmed");
    }
    Ok(())
}

fn positions(ops: &[Operation], pred: impl Fn(&Operation) -> bool) -> Vec<usize> {
    ops.iter()
        .enumerate()
        .filter(|(_, op)| pred(op))
        .map(|(i, _)| i)
        .collect()
}
