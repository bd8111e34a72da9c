//! Consent-popup dismissal and phone reveal over a [`BrowserDriver`]
//!
//! [`BrowserDriver`]: crate::browser::BrowserDriver

#[cfg(test)]
pub(crate) mod fake;
mod phone;
mod popup;
mod session;

pub use phone::{PhoneRevealer, RevealOutcome, RevealState, ValueLocation};
pub use popup::{DismissStrategy, PopupResolver};
pub use session::BrowserSession;
