//! Atomic batch composition with typed argument binding.
//!
//! A [`Batch`] is an ordered list of [`Operation`]s that the ledger executes
//! all-or-nothing. Arguments are either literals or references to outputs of
//! *earlier* operations in the same batch. References are resolved while
//! the batch is being built, never at submission time:
//!
//! - a reference to an operation that is not strictly earlier fails,
//! - a reference to an output index the operation does not produce fails,
//! - a reference to an output that was already moved fails.
//!
//! All three raise [`TurnstileError::UnresolvedReference`]. Composition has
//! no side effects; nothing touches the network until the batch is submitted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use turnstile_types::{Address, BatchDigest, ObjectId, Result, TurnstileError, constants};

/// A literal argument. Monetary amounts are always integer minor units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PureValue {
    U64(u64),
    Bool(bool),
    String(String),
    Address(Address),
    Id(ObjectId),
}

/// The `output`-th value produced by operation `operation` of the same batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ValueRef {
    pub operation: usize,
    pub output: usize,
}

/// One argument binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Argument {
    Pure(PureValue),
    /// An existing ledger object passed by id.
    Object(ObjectId),
    /// The sender's gas coin.
    GasCoin,
    /// Consume an earlier output. It cannot be referenced again.
    Move(ValueRef),
    /// Use an earlier output by reference, leaving it available.
    Borrow(ValueRef),
}

impl Argument {
    #[must_use]
    pub fn u64(value: u64) -> Self {
        Self::Pure(PureValue::U64(value))
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Pure(PureValue::String(value.into()))
    }

    #[must_use]
    pub fn address(value: Address) -> Self {
        Self::Pure(PureValue::Address(value))
    }

    #[must_use]
    pub fn id(value: ObjectId) -> Self {
        Self::Pure(PureValue::Id(value))
    }

    /// The output this argument refers to, if any.
    #[must_use]
    pub fn value_ref(&self) -> Option<ValueRef> {
        match self {
            Self::Move(r) | Self::Borrow(r) => Some(*r),
            _ => None,
        }
    }
}

/// What an operation invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    /// A package function, fully qualified (`package::module::function`).
    Call(String),
    /// Split fresh coins off a source coin; one output per amount.
    SplitCoins,
    /// Send objects to the address given as the last argument.
    TransferObjects,
}

impl Target {
    #[must_use]
    pub fn is_call_to(&self, target: &str) -> bool {
        matches!(self, Self::Call(t) if t == target)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call(t) => f.write_str(t),
            Self::SplitCoins => write!(f, "<split_coins>"),
            Self::TransferObjects => write!(f, "<transfer_objects>"),
        }
    }
}

/// One operation descriptor: `{target, typeArguments[], arguments[]}` plus
/// the number of outputs it yields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub target: Target,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub outputs: usize,
}

impl Operation {
    #[must_use]
    pub fn call(
        target: impl Into<String>,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
        outputs: usize,
    ) -> Self {
        Self {
            target: Target::Call(target.into()),
            type_arguments,
            arguments,
            outputs,
        }
    }

    /// Split one coin per amount off `source`.
    #[must_use]
    pub fn split_coins(source: Argument, amounts: &[u64]) -> Self {
        let mut arguments = Vec::with_capacity(amounts.len() + 1);
        arguments.push(source);
        arguments.extend(amounts.iter().copied().map(Argument::u64));
        Self {
            target: Target::SplitCoins,
            type_arguments: Vec::new(),
            arguments,
            outputs: amounts.len(),
        }
    }

    #[must_use]
    pub fn transfer_objects(objects: Vec<Argument>, recipient: Address) -> Self {
        let mut arguments = objects;
        arguments.push(Argument::address(recipient));
        Self {
            target: Target::TransferObjects,
            type_arguments: Vec::new(),
            arguments,
            outputs: 0,
        }
    }

    /// Whether this operation consumes `value`.
    #[must_use]
    pub fn moves(&self, value: ValueRef) -> bool {
        self.arguments.contains(&Argument::Move(value))
    }
}

/// Handle to an operation pushed into a [`BatchBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpHandle {
    pub index: usize,
    pub outputs: usize,
}

impl OpHandle {
    /// Reference to the `n`-th output. Validity is checked when the
    /// reference is used, not here.
    #[must_use]
    pub fn output(&self, n: usize) -> ValueRef {
        ValueRef {
            operation: self.index,
            output: n,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A finished, validated, immutable batch plus its declared resource budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    operations: Vec<Operation>,
    gas_budget: u64,
}

impl Batch {
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    #[must_use]
    pub fn gas_budget(&self) -> u64 {
        self.gas_budget
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Index of the first call to `target`.
    #[must_use]
    pub fn position_of_call(&self, target: &str) -> Option<usize> {
        self.operations.iter().position(|op| op.target.is_call_to(target))
    }

    /// Deterministic digest committing to every operation and the budget.
    #[must_use]
    pub fn digest(&self) -> BatchDigest {
        let mut hasher = Sha256::new();
        hasher.update(constants::BATCH_DOMAIN);
        hasher.update(self.gas_budget.to_le_bytes());
        hasher.update((self.operations.len() as u64).to_le_bytes());
        for op in &self.operations {
            hash_operation(&mut hasher, op);
        }
        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        BatchDigest(digest)
    }

    /// Bytes handed to the key custody provider: domain, sender, digest.
    #[must_use]
    pub fn signing_bytes(&self, sender: &Address) -> Vec<u8> {
        let digest = self.digest();
        let mut bytes = Vec::with_capacity(constants::BATCH_DOMAIN.len() + 96);
        bytes.extend_from_slice(constants::BATCH_DOMAIN);
        bytes.extend_from_slice(&(sender.as_str().len() as u64).to_le_bytes());
        bytes.extend_from_slice(sender.as_str().as_bytes());
        bytes.extend_from_slice(digest.as_bytes());
        bytes
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_value_ref(hasher: &mut Sha256, r: ValueRef) {
    hasher.update((r.operation as u64).to_le_bytes());
    hasher.update((r.output as u64).to_le_bytes());
}

fn hash_operation(hasher: &mut Sha256, op: &Operation) {
    match &op.target {
        Target::Call(t) => {
            hasher.update([0u8]);
            hash_str(hasher, t);
        }
        Target::SplitCoins => hasher.update([1u8]),
        Target::TransferObjects => hasher.update([2u8]),
    }
    hasher.update((op.type_arguments.len() as u64).to_le_bytes());
    for ty in &op.type_arguments {
        hash_str(hasher, ty);
    }
    hasher.update((op.arguments.len() as u64).to_le_bytes());
    for arg in &op.arguments {
        match arg {
            Argument::Pure(PureValue::U64(v)) => {
                hasher.update([0u8]);
                hasher.update(v.to_le_bytes());
            }
            Argument::Pure(PureValue::Bool(b)) => hasher.update([1u8, u8::from(*b)]),
            Argument::Pure(PureValue::String(s)) => {
                hasher.update([2u8]);
                hash_str(hasher, s);
            }
            Argument::Pure(PureValue::Address(a)) => {
                hasher.update([3u8]);
                hash_str(hasher, a.as_str());
            }
            Argument::Pure(PureValue::Id(id)) => {
                hasher.update([4u8]);
                hash_str(hasher, id.as_str());
            }
            Argument::Object(id) => {
                hasher.update([5u8]);
                hash_str(hasher, id.as_str());
            }
            Argument::GasCoin => hasher.update([6u8]),
            Argument::Move(r) => {
                hasher.update([7u8]);
                hash_value_ref(hasher, *r);
            }
            Argument::Borrow(r) => {
                hasher.update([8u8]);
                hash_value_ref(hasher, *r);
            }
        }
    }
    hasher.update((op.outputs as u64).to_le_bytes());
}

// ---------------------------------------------------------------------------
// BatchBuilder
// ---------------------------------------------------------------------------

/// Incrementally builds a [`Batch`], resolving references as operations are
/// pushed.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    operations: Vec<Operation>,
    /// Outputs already moved into a later operation.
    consumed: HashSet<ValueRef>,
    gas_budget: u64,
}

impl BatchBuilder {
    #[must_use]
    pub fn new(gas_budget: u64) -> Self {
        Self {
            operations: Vec::new(),
            consumed: HashSet::new(),
            gas_budget,
        }
    }

    /// Validate and append an operation.
    ///
    /// On error the builder is left unchanged.
    ///
    /// # Errors
    /// - [`TurnstileError::UnresolvedReference`] for a dangling, forward or
    ///   already-consumed reference
    /// - [`TurnstileError::InvalidArgument`] for blank targets, ids or
    ///   addresses, or a transfer with nothing to transfer
    pub fn push(&mut self, op: Operation) -> Result<OpHandle> {
        let index = self.operations.len();
        self.check_shape(index, &op)?;

        let mut moved_here = HashSet::new();
        for arg in &op.arguments {
            match arg {
                Argument::Move(r) | Argument::Borrow(r) => {
                    self.resolve(index, *r)?;
                    if moved_here.contains(r) {
                        return Err(TurnstileError::UnresolvedReference {
                            operation: index,
                            reason: format!(
                                "output {} of operation {} is used after being moved in the same operation",
                                r.output, r.operation
                            ),
                        });
                    }
                    if matches!(arg, Argument::Move(_)) {
                        moved_here.insert(*r);
                    }
                }
                Argument::Object(id) | Argument::Pure(PureValue::Id(id)) if id.is_empty() => {
                    return Err(TurnstileError::invalid_argument(format!(
                        "operation {index}: empty object id"
                    )));
                }
                Argument::Pure(PureValue::Address(a)) if a.is_empty() => {
                    return Err(TurnstileError::invalid_argument(format!(
                        "operation {index}: empty address"
                    )));
                }
                _ => {}
            }
        }

        self.consumed.extend(moved_here);
        let outputs = op.outputs;
        self.operations.push(op);
        Ok(OpHandle { index, outputs })
    }

    fn check_shape(&self, index: usize, op: &Operation) -> Result<()> {
        match &op.target {
            Target::Call(t) if t.trim().is_empty() => Err(TurnstileError::invalid_argument(
                format!("operation {index}: empty call target"),
            )),
            Target::SplitCoins if op.arguments.len() < 2 => Err(TurnstileError::invalid_argument(
                format!("operation {index}: split needs a source coin and at least one amount"),
            )),
            Target::TransferObjects if op.arguments.len() < 2 => {
                Err(TurnstileError::invalid_argument(format!(
                    "operation {index}: transfer needs at least one object and a recipient"
                )))
            }
            Target::TransferObjects
                if !matches!(
                    op.arguments.last(),
                    Some(Argument::Pure(PureValue::Address(_)))
                ) =>
            {
                Err(TurnstileError::invalid_argument(format!(
                    "operation {index}: transfer recipient must be an address literal"
                )))
            }
            _ => Ok(()),
        }
    }

    fn resolve(&self, index: usize, r: ValueRef) -> Result<()> {
        let unresolved = |reason: String| TurnstileError::UnresolvedReference {
            operation: index,
            reason,
        };
        if r.operation >= index {
            return Err(unresolved(format!(
                "operation {} is not earlier in the batch",
                r.operation
            )));
        }
        let produced = self.operations[r.operation].outputs;
        if r.output >= produced {
            return Err(unresolved(format!(
                "operation {} produces {produced} outputs, output {} does not exist",
                r.operation, r.output
            )));
        }
        if self.consumed.contains(&r) {
            return Err(unresolved(format!(
                "output {} of operation {} was already consumed",
                r.output, r.operation
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether `r` has already been moved.
    #[must_use]
    pub fn is_consumed(&self, r: ValueRef) -> bool {
        self.consumed.contains(&r)
    }

    /// # Errors
    /// Returns [`TurnstileError::EmptyBatch`] if no operation was pushed.
    pub fn finish(self) -> Result<Batch> {
        if self.operations.is_empty() {
            return Err(TurnstileError::EmptyBatch);
        }
        let batch = Batch {
            operations: self.operations,
            gas_budget: self.gas_budget,
        };
        tracing::debug!(
            digest = %batch.digest(),
            operations = batch.len(),
            gas_budget = batch.gas_budget,
            "Batch composed"
        );
        Ok(batch)
    }
}

/// Compose a batch from an ordered list of descriptors.
///
/// # Errors
/// See [`BatchBuilder::push`] and [`BatchBuilder::finish`].
pub fn compose(operations: Vec<Operation>, gas_budget: u64) -> Result<Batch> {
    let mut builder = BatchBuilder::new(gas_budget);
    for op in operations {
        builder.push(op)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint_op() -> Operation {
        Operation::call(
            "0xpkg::ticketing::mint_ticket",
            vec![],
            vec![Argument::Object(ObjectId::new("0xclass"))],
            1,
        )
    }

    #[test]
    fn references_to_earlier_outputs_resolve() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        b.push(Operation::transfer_objects(
            vec![Argument::Move(mint.output(0))],
            Address::new("0xalice"),
        ))
        .unwrap();
        let batch = b.finish().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.gas_budget(), 1_000);
    }

    #[test]
    fn forward_reference_fails() {
        let mut b = BatchBuilder::new(1_000);
        let err = b
            .push(Operation::transfer_objects(
                vec![Argument::Move(ValueRef {
                    operation: 0,
                    output: 0,
                })],
                Address::new("0xalice"),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            TurnstileError::UnresolvedReference { operation: 0, .. }
        ));
        assert!(b.is_empty(), "failed push must not modify the builder");
    }

    #[test]
    fn nonexistent_output_fails() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        let err = b
            .push(Operation::transfer_objects(
                vec![Argument::Move(mint.output(1))],
                Address::new("0xalice"),
            ))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::UnresolvedReference { .. }));
    }

    #[test]
    fn consumed_output_cannot_be_reused() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        b.push(Operation::transfer_objects(
            vec![Argument::Move(mint.output(0))],
            Address::new("0xalice"),
        ))
        .unwrap();
        assert!(b.is_consumed(mint.output(0)));

        let err = b
            .push(Operation::transfer_objects(
                vec![Argument::Move(mint.output(0))],
                Address::new("0xbob"),
            ))
            .unwrap_err();
        assert!(
            matches!(&err, TurnstileError::UnresolvedReference { reason, .. } if reason.contains("consumed")),
            "Expected consumed reference error, got: {err:?}"
        );

        let err = b
            .push(Operation::call(
                "0xpkg::ticketing::inspect",
                vec![],
                vec![Argument::Borrow(mint.output(0))],
                0,
            ))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::UnresolvedReference { .. }));
    }

    #[test]
    fn borrow_does_not_consume() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        b.push(Operation::call(
            "0xpkg::ticketing::inspect",
            vec![],
            vec![Argument::Borrow(mint.output(0))],
            0,
        ))
        .unwrap();
        assert!(!b.is_consumed(mint.output(0)));
        b.push(Operation::transfer_objects(
            vec![Argument::Move(mint.output(0))],
            Address::new("0xalice"),
        ))
        .unwrap();
    }

    #[test]
    fn double_move_in_one_operation_fails() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        let err = b
            .push(Operation::transfer_objects(
                vec![Argument::Move(mint.output(0)), Argument::Move(mint.output(0))],
                Address::new("0xalice"),
            ))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::UnresolvedReference { .. }));
        assert!(!b.is_consumed(mint.output(0)));
    }

    #[test]
    fn blank_ids_rejected() {
        let mut b = BatchBuilder::new(1_000);
        let err = b
            .push(Operation::call(
                "0xpkg::ticketing::mint_ticket",
                vec![],
                vec![Argument::Object(ObjectId::new(""))],
                1,
            ))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidArgument { .. }));
    }

    #[test]
    fn transfer_requires_address_recipient() {
        let mut b = BatchBuilder::new(1_000);
        let mint = b.push(mint_op()).unwrap();
        let op = Operation {
            target: Target::TransferObjects,
            type_arguments: vec![],
            arguments: vec![Argument::Move(mint.output(0)), Argument::u64(5)],
            outputs: 0,
        };
        assert!(matches!(
            b.push(op),
            Err(TurnstileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn empty_batch_rejected() {
        assert!(matches!(
            BatchBuilder::new(1).finish(),
            Err(TurnstileError::EmptyBatch)
        ));
        assert!(matches!(compose(vec![], 1), Err(TurnstileError::EmptyBatch)));
    }

    #[test]
    fn digest_is_deterministic_and_sensitive() {
        let a = compose(vec![mint_op()], 1_000).unwrap();
        let b = compose(vec![mint_op()], 1_000).unwrap();
        assert_eq!(a.digest(), b.digest());

        let c = compose(vec![mint_op()], 2_000).unwrap();
        assert_ne!(a.digest(), c.digest());

        let mut other = mint_op();
        other.arguments = vec![Argument::Object(ObjectId::new("0xclass2"))];
        let d = compose(vec![other], 1_000).unwrap();
        assert_ne!(a.digest(), d.digest());
    }

    #[test]
    fn signing_bytes_bind_sender() {
        let batch = compose(vec![mint_op()], 1_000).unwrap();
        let alice = batch.signing_bytes(&Address::new("0xalice"));
        let bob = batch.signing_bytes(&Address::new("0xbob"));
        assert_ne!(alice, bob);
        assert!(alice.starts_with(constants::BATCH_DOMAIN));
    }

    #[test]
    fn descriptors_deserialize_from_json() {
        let json = r#"[
            { "target": { "call": "0xpkg::ticketing::mint_ticket" },
              "arguments": [ { "object": "0xclass" } ], "outputs": 1 },
            { "target": "transferObjects",
              "arguments": [ { "move": { "operation": 0, "output": 0 } },
                             { "pure": { "address": "0xalice" } } ] }
        ]"#;
        let ops: Vec<Operation> = serde_json::from_str(json).unwrap();
        let batch = compose(ops, 10).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.position_of_call("0xpkg::ticketing::mint_ticket"), Some(0));
    }
}
