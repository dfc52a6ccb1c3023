pub mod backend;
pub mod file;
pub mod level;
pub mod mic;

pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource,
};
pub use file::FileBackend;
pub use level::{rms_dbfs, LevelMeter};
pub use mic::MicrophoneBackend;
