//! vchat core: a headless animated-avatar chat companion.
//!
//! The renderer front-end talks to this crate over JSON lines on
//! stdin/stdout (`ipc`). The core streams chat replies, speaks them sentence
//! by sentence, and drives the avatar's face and body every frame.

pub mod animation;
pub mod chat;
pub mod config;
pub mod controls;
pub mod ipc;
pub mod logging;
pub mod models;
pub mod rig;
pub mod session;
pub mod speech;
pub mod state;
