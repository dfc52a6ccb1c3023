pub mod audio;
pub mod config;
pub mod event;
pub mod session;
pub mod speech;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, FileBackend,
    MicrophoneBackend,
};
pub use config::Config;
pub use event::{CaptureEvent, ChannelSink, ErrorKind, EventSink, TranscriptPayload};
pub use session::{AdapterState, CaptureAdapter, SessionConfig, SessionStats, TranscriptSegment};
pub use speech::{
    AuthorizationStatus, RecognitionConfig, RecognitionStream, RecognitionUpdate, ScriptedEngine,
    SpeechEngine,
};
