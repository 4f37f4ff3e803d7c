//! Process-wide sysex handler registry.
//!
//! Maps an extended-command id to the function that interprets a completed
//! sysex body. The table is shared by every [`Board`] in the process so that
//! custom extended commands can be registered once at start-up. Built-in
//! handlers for the standard replies are pre-registered and can be replaced
//! or removed like any other entry.
//!
//! Registration is visible to all sessions immediately; register before
//! traffic starts if sessions must agree on the table.

use crate::board::{self, Board};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{
    ANALOG_MAPPING_RESPONSE, CAPABILITY_RESPONSE, I2C_REPLY, ONEWIRE_DATA, PING_READ,
    PIN_STATE_RESPONSE, QUERY_FIRMWARE, SERIAL_MESSAGE, STEPPER, STRING_DATA,
};

/// Handler invoked with the session and the sysex body (envelope and id
/// stripped).
pub type SysexHandler = Arc<dyn Fn(&mut Board, &[u8]) + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<u8, SysexHandler>>> =
    Lazy::new(|| RwLock::new(builtin_handlers()));

fn builtin_handlers() -> HashMap<u8, SysexHandler> {
    let mut table: HashMap<u8, SysexHandler> = HashMap::new();
    table.insert(QUERY_FIRMWARE, Arc::new(board::handle_firmware));
    table.insert(CAPABILITY_RESPONSE, Arc::new(board::handle_capabilities));
    table.insert(ANALOG_MAPPING_RESPONSE, Arc::new(board::handle_analog_mapping));
    table.insert(PIN_STATE_RESPONSE, Arc::new(board::handle_pin_state));
    table.insert(STRING_DATA, Arc::new(board::handle_string));
    table.insert(I2C_REPLY, Arc::new(board::i2c::handle_reply));
    table.insert(ONEWIRE_DATA, Arc::new(board::onewire::handle_reply));
    table.insert(SERIAL_MESSAGE, Arc::new(board::serial::handle_reply));
    table.insert(STEPPER, Arc::new(board::stepper::handle_reply));
    table.insert(PING_READ, Arc::new(board::ping::handle_reply));
    table
}

/// Install `handler` for `id`, returning whatever was registered before.
pub fn register<F>(id: u8, handler: F) -> Option<SysexHandler>
where
    F: Fn(&mut Board, &[u8]) + Send + Sync + 'static,
{
    debug!(id = format_args!("0x{:02x}", id), "registering sysex handler");
    REGISTRY.write().insert(id, Arc::new(handler))
}

/// Remove the handler for `id`. Frames with that id are then discarded.
pub fn unregister(id: u8) -> Option<SysexHandler> {
    debug!(id = format_args!("0x{:02x}", id), "removing sysex handler");
    REGISTRY.write().remove(&id)
}

/// Look up the handler for `id`.
///
/// The lock is released before the caller runs the handler, so handlers may
/// themselves register or remove entries.
pub fn lookup(id: u8) -> Option<SysexHandler> {
    REGISTRY.read().get(&id).cloned()
}

pub fn is_registered(id: u8) -> bool {
    REGISTRY.read().contains_key(&id)
}

/// Drop all custom entries and reinstall the built-in handlers.
pub fn restore_builtins() {
    *REGISTRY.write() = builtin_handlers();
}
