//! Transaction pipeline: gas and nonce selection, building, signing,
//! submission and confirmation

pub mod builder;
pub mod gas;
pub mod intent;
pub mod nonce;
pub mod receipt;
pub mod sender;
pub mod signer;
pub mod waiter;

pub use builder::{TransactionBuilder, UnsignedTransaction};
pub use gas::{ensure_affordable, escalate, GasPolicy, GasQuote};
pub use intent::{parse_address, PendingIntent};
pub use nonce::NonceSequencer;
pub use receipt::{LogEntry, Receipt, ReceiptStatus};
pub use sender::{classify_rejection, Submitter, TransactionHandle};
pub use signer::{sign, SignedTransaction};
pub use waiter::{Clock, ConfirmationWaiter, TokioClock, WaitOutcome, WaitState};
