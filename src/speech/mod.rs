//! Speech recognition seam
//!
//! The adapter treats the recognizer as an opaque collaborator behind the
//! `SpeechEngine` trait: request authorization, open a session bound to a
//! live audio stream, read back partial/final updates or a terminal error.

pub mod engine;
pub mod scripted;

pub use engine::{
    AuthorizationStatus, RecognitionConfig, RecognitionStream, RecognitionUpdate, SpeechEngine,
};
pub use scripted::ScriptedEngine;
