#![deny(missing_docs)]
//! # NMEA to positioning log converter
//!
//! Decodes a stream of NMEA 0183 sentences (`GPRMC`, `GPGGA`, `GPGSV`)
//! into normalized fix records and re-encodes them as the line-oriented
//! positioning log consumed by the log replayer. Sentences are
//! aggregated into receiver update cycles by a receiver-specific
//! trigger; on every completed cycle the position, course, accuracy and
//! satellite records are written, optionally followed by vehicle speed,
//! yaw rate and rear wheel ticks dead-reckoned from consecutive fixes.

pub mod config;
pub mod convert;
pub mod cycle;
pub mod dr;
pub mod nmea;
pub mod poslog;

pub use config::ConverterCfg;
pub use convert::{convert_file, ConvertError, Converter};
pub use cycle::{CycleSnapshot, CycleState, ReceiverProfile, SatelliteBuffer};
pub use dr::{DeadReckoning, VehicleGeometry, WheelTicks};
pub use nmea::{FixQuality, PositionVelocity, RawSentence, SatelliteView, Sentence};
pub use poslog::LogWriter;
