//! Bus core: state, scheduling and reply gathering.
//!
//! The public API from this module is [`Bus`] (with [`BusBuilder`] and [`BusConfig`])
//! plus the futures it returns.
//!
//! Internal modules:
//! - [`registry`]: handler identity and handler→topics side table;
//! - [`scheduler`]: pending queue, ticks, cycle ids and delivery;
//! - [`completion`]: one-tick-lookahead resolution of delivery futures;
//! - [`request`]: will/did reply gathering with timeouts.

use std::any::Any;

mod builder;
mod bus;
mod completion;
mod config;
mod registry;
mod request;
mod scheduler;

pub use builder::BusBuilder;
pub use bus::{Bus, ErrorHandler, Mediator};
pub use completion::{DeliveryFuture, GatherFuture};
pub use config::BusConfig;

pub(crate) use bus::Inner;

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*caught), "boom");

        let caught = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*caught), "code 7");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(&*caught), "unknown panic");
    }
}
