//! Magic-link authentication.
//!
//! Login emails an encrypted, nonce-bound link; clicking it either signs the
//! user in or prompts for signup. Authenticated state lives in a signed
//! session cookie, never in a server-side session table.

pub mod gate;
pub mod login;
pub mod magic_link;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
pub mod validate;

mod utils;

pub use state::{AuthConfig, AuthState};
