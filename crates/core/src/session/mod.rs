//! Authentication token lifecycle
//!
//! Components, bottom-up:
//! - [`vault`]: typed credential reads/writes over a [`ports::CredentialStore`]
//! - [`gate`]: the process-wide token gate
//! - [`pre_refresh`]: cold-start refresh before the first protected request
//! - [`refresh_queue`] and [`refresh`]: one network refresh at a time, with
//!   every concurrent 401 waiting on its outcome
//! - [`terminator`] and [`events`]: credential wipe plus auth-changed
//!   notification
//! - [`controller`]: the single instance wiring them together

pub mod controller;
pub mod events;
pub mod gate;
pub mod ports;
pub mod pre_refresh;
pub mod refresh;
pub mod refresh_queue;
pub mod single_flight;
pub mod terminator;
pub mod vault;

pub use controller::{SessionConfig, SessionController};
pub use events::{AuthEvent, AuthEvents, ListenerId};
pub use gate::{GateState, TokenGate};
pub use pre_refresh::{PreRefreshCoordinator, PreRefreshState};
pub use refresh::RefreshCoordinator;
pub use refresh_queue::{RefreshFailure, RefreshOutcome, RefreshQueue};
pub use terminator::SessionTerminator;
pub use vault::CredentialVault;
