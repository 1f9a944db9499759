//! Integration test modules for fxhost
//!
//! - host: Opening effects, bootstrap, options, negotiation scenario
//! - presets: Preset storage round trips, migration, import/export
//! - realtime: Master/slave groups driven cycle by cycle

pub mod host;
pub mod presets;
pub mod realtime;
