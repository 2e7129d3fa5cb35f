//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Session value, token-free status, token pair
//! - `event`: Transition notifications
//! - `bus`: Typed publish/subscribe channel for transitions
//! - `manager`: The session state machine
//!
//! # Usage
//!
//! ```ignore
//! use spendlens_core::session::{SessionManager, TokenPair};
//!
//! let manager = SessionManager::restore(store)?;
//! let _sub = manager.subscribe(|event| println!("{:?}", event.current));
//! manager.establish(TokenPair::new(access, refresh), "alice")?;
//! ```

mod bus;
mod event;
mod manager;
mod model;

pub use bus::{SessionBus, Subscription};
pub use event::{SessionEvent, TransitionCause};
pub use manager::{SessionError, SessionManager};
pub use model::{Bearer, FALLBACK_USERNAME, Session, SessionStatus, TokenPair};
