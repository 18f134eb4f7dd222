//! Session-backed adapters for guest identities.

pub mod guest_store;

pub use guest_store::GuestProgressStore;
