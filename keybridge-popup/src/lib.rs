//! # Keybridge Popup
//!
//! The popup view state machine: a closed set of named views, the transient
//! per-flow state, and the single controller through which every transition
//! goes. The UI layer reads snapshots; the flow engines request transitions.
//!
//! The machine guarantees two invariants regardless of which flow was active:
//! - closing the popup always lands back on method selection with every
//!   transient field cleared;
//! - opening a flow resets all transient state before the first view shows.

pub mod controller;
pub mod state;
pub mod view;

// Re-export commonly used types at crate root
pub use controller::PopupController;
pub use state::{MfaSetup, OAuthErrorInfo, PopupState, Transient, WalletInfo};
pub use view::{EmailStep, MfaStep, View};
