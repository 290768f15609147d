//! Two-way audio bridge for doorbell cameras with an ONVIF RTSP backchannel.
//!
//! ```no_run
//! use std::time::Duration;
//! use backchannel::{AudioBridge, BridgeConfig};
//!
//! let bridge = AudioBridge::new(
//!     "rtsp://192.168.1.20:554/h264Preview_01_main",
//!     "admin",
//!     "secret",
//!     BridgeConfig::default(),
//! )?;
//! if bridge.start()? {
//!     bridge.send_audio(vec![0u8; 4096])?;
//! }
//! let _camera_audio = bridge.recv_audio(Duration::from_millis(500));
//! bridge.disconnect();
//! bridge.cleanup();
//! # Ok::<(), backchannel::BridgeError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod transport;

pub use bridge::AudioBridge;
pub use config::{AudioConfig, BridgeConfig, EgressStrategy, SessionConfig};
pub use error::{BridgeError, ErrorClass, Result};
pub use media::FrameEncoder;
pub use queue::BoundedQueue;
pub use session::{NegotiationState, RtspSession};
