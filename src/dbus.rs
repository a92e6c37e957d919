//! D-Bus integration for Venus OS compatibility
//!
//! Exposes the inverter as a `com.victronenergy.pvinverter.*` service using
//! the VeDbus BusItem convention: every path is its own object implementing
//! `com.victronenergy.BusItem`, and the root object answers `GetItems` and
//! emits `ItemsChanged`. Invalid values travel as an empty `ai` array with
//! the text `---`.

mod identity;
mod items;
mod root;
mod service;
mod shared;
mod util;

pub use identity::{ServiceIdentity, pvinverter_paths};
pub use service::DbusService;
pub use util::{format_text_value, owned_value_to_serde, serde_to_owned_value};
