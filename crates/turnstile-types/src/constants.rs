//! System-wide constants for the Turnstile lifecycle engine.

/// Default ticketing module name inside the configured package.
pub const DEFAULT_MODULE: &str = "ticketing";

/// Default framework package hosting escrow, policy and coin primitives.
pub const DEFAULT_FRAMEWORK_PACKAGE: &str = "0x2";

/// Default native coin type (gas and payment currency).
pub const DEFAULT_COIN_TYPE: &str = "0x2::sui::SUI";

/// Default per-batch resource budget, in native minor units.
pub const DEFAULT_GAS_BUDGET: u64 = 50_000_000;

/// Default allowance on top of the declared price when reconciling a
/// payer's spend, in native minor units.
pub const DEFAULT_FEE_ALLOWANCE: u64 = 10_000_000;

/// Basis-point denominator for royalty rates.
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

/// Default polling interval for bounded external waits.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default maximum polling attempts for bounded external waits.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;

/// Default cap on a single backoff interval.
pub const DEFAULT_POLL_MAX_INTERVAL_MS: u64 = 10_000;

// --- Ticketing package functions -------------------------------------------

pub const FN_CREATE_EVENT: &str = "create_event";
pub const FN_CREATE_CLASS: &str = "create_ticket_class";
pub const FN_MINT: &str = "mint_ticket";
pub const FN_CHECK_IN: &str = "check_in";

// --- Framework functions (relative to the framework package) ---------------

pub const FRAMEWORK_CREATE_ESCROW: &str = "kiosk::default";
pub const FRAMEWORK_PLACE: &str = "kiosk::place";
pub const FRAMEWORK_PURCHASE: &str = "kiosk::purchase";
pub const FRAMEWORK_CONFIRM: &str = "transfer_policy::confirm_request";

// --- Struct names used for semantic type-tag matching ----------------------

pub const STRUCT_EVENT: &str = "Event";
pub const STRUCT_CLASS: &str = "TicketClass";
pub const STRUCT_TICKET: &str = "Ticket";
pub const STRUCT_ESCROW: &str = "Kiosk";
pub const STRUCT_ESCROW_CAP: &str = "KioskOwnerCap";

/// Domain separator prefixed to batch bytes before digesting and signing.
pub const BATCH_DOMAIN: &[u8] = b"turnstile:batch:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
