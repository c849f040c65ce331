//! Browser capability surface: the narrow page-interaction traits, the
//! humanlike input driver layered on them, and the CDP glue adapter.

pub mod cdp;
pub mod driver;
pub mod errors;
pub mod humanize;

pub use driver::{ElementBox, ElementHandle, PageDriver, SessionFactory, SessionRequest};
pub use errors::DriveError;
pub use humanize::{DelayBand, HumanInput, TypingSpeed};
