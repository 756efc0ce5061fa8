//! Session-based multi-sensor logger for a mobile data-capture rig.
//!
//! A debounced button starts and stops logging sessions. While a session is
//! active, a fixed-interval scheduler samples the IMU every 10ms and the GPS
//! receiver every 500ms on parallel workers, an optional video recorder
//! captures frames on the same loop, and a fix indicator blinks until the
//! receiver acquires satellites. Closing a session renders both sample
//! buffers into one tabulated log file plus a JSON summary.

pub mod buttons;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod report;
pub mod samples;
pub mod scheduler;
pub mod session;
pub mod sim;
pub mod status;
pub mod storage;

pub use error::{LoggerError, Result};
pub use samples::{GpsRecord, ImuRecord, MotionSample, PositionReport};
pub use scheduler::{SamplingMode, SamplingScheduler};
pub use session::{SessionController, SessionState};
