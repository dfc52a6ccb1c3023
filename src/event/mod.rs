pub mod messages;
pub mod sink;

pub use messages::{
    CaptureEvent, ErrorKind, ErrorPayload, SpeechEndPayload, SpeechStartPayload,
    TranscriptPayload, VolumePayload,
};
pub use sink::{ChannelSink, EventSink};
