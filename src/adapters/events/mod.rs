//! Event bus adapters.
//!
//! - `InMemoryEventBus` - in-process bus that delivers membership events to
//!   subscribers such as the notifier

mod in_memory;

pub use in_memory::InMemoryEventBus;
