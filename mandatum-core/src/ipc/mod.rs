//! Event types published on the engine's broadcast channels.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them to any presentation surface (terminal, IPC bus, socket)
//! without re-mapping.

pub mod events;
