//! Session lifecycle: token/user state, expiry checks and the unauthorized
//! reaction.

pub mod jwt;
mod session;
mod unauthorized;

pub use session::{Session, SessionState};
pub use unauthorized::{Navigator, RouteState, UnauthorizedHandler};
