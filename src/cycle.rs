//! Cycle state: the satellite buffer, the current/previous fix
//! snapshots and the receiver-specific cycle completion policy.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::nmea::{FixQuality, PositionVelocity, SatelliteView, Sentence};

/// Fixed three-slot buffer collecting one multi-sentence satellite
/// report (up to 12 satellites). Slots are independent; a sentence only
/// ever replaces the slot matching its own index.
#[derive(Debug, Clone, Copy, Default)]
pub struct SatelliteBuffer {
    slots: [SatelliteView; 3],
}

impl SatelliteBuffer {
    /// Store a satellite sentence under its one-based sentence index.
    /// Sentences with a missing or out-of-range index are dropped.
    pub fn insert(&mut self, view: SatelliteView) {
        if let Some(idx) = view.sentence_index {
            if (1..=3).contains(&idx) {
                self.slots[(idx - 1) as usize] = view;
            }
        }
    }

    /// All three slots in index order.
    pub fn slots(&self) -> &[SatelliteView; 3] {
        &self.slots
    }
}

/// Receiver profile deciding when a burst of sentences forms one
/// complete update cycle.
///
/// Receivers differ in which sentence closes the burst: the Garmin
/// Geko 301 ends with a route sentence, while SiRF-based receivers such
/// as the Becker Z205 end with the RMC sentence itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverProfile {
    /// Garmin Geko 301: `GPRTE` closes the cycle, 2 s update interval.
    Geko301,
    /// Becker PND Z205 (SiRFStarIII): `GPRMC` closes the cycle, 1 s
    /// update interval.
    Z205,
}

impl ReceiverProfile {
    /// True when `sentence` is this profile's cycle-closing trigger.
    pub fn is_trigger(&self, sentence: &Sentence) -> bool {
        match self {
            Self::Geko301 => matches!(sentence, Sentence::Route),
            Self::Z205 => matches!(sentence, Sentence::PositionVelocity(_)),
        }
    }

    /// Nominal update interval in ms, used to advance the timestamp
    /// when the receiver provides no time of day.
    pub fn update_interval_ms(&self) -> u64 {
        match self {
            Self::Geko301 => 2000,
            Self::Z205 => 1000,
        }
    }
}

impl fmt::Display for ReceiverProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Geko301 => write!(f, "geko301"),
            Self::Z205 => write!(f, "z205"),
        }
    }
}

/// Error for an unrecognized receiver profile name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown receiver type {0:?} (supported: geko301, z205)")]
pub struct UnknownProfile(String);

impl FromStr for ReceiverProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geko301" => Ok(Self::Geko301),
            "z205" => Ok(Self::Z205),
            other => Err(UnknownProfile(other.to_string())),
        }
    }
}

/// All decoder output contributing to one update cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSnapshot {
    /// Latest position/time/velocity record of the cycle.
    pub position_velocity: PositionVelocity,
    /// Latest fix-quality record of the cycle.
    pub fix_quality: FixQuality,
    /// Satellite report buffer of the cycle.
    pub satellites: SatelliteBuffer,
    /// Milliseconds since local midnight; 0 until the first cycle with
    /// a usable time closes.
    pub timestamp: u64,
}

/// Current and previous cycle snapshots. Exclusively owned by the
/// conversion driver; never shared.
#[derive(Debug, Default)]
pub struct CycleState {
    /// Snapshot being filled by incoming sentences.
    pub current: CycleSnapshot,
    /// Snapshot of the last flushed cycle, input to dead reckoning.
    pub previous: CycleSnapshot,
}

impl CycleState {
    /// Fold one decoded sentence into the current snapshot.
    pub fn absorb(&mut self, sentence: &Sentence) {
        match sentence {
            Sentence::PositionVelocity(pv) => self.current.position_velocity = *pv,
            Sentence::FixQuality(fq) => self.current.fix_quality = *fq,
            Sentence::SatelliteView(sv) => self.current.satellites.insert(*sv),
            Sentence::Route | Sentence::Ignored => {}
        }
    }

    /// Derive the cycle timestamp on a trigger sentence: taken from the
    /// fix's time of day when present, otherwise advanced from the
    /// previous timestamp by the profile's update interval. Returns
    /// true when a positive timestamp exists and the cycle may flush.
    pub fn close_cycle(&mut self, profile: ReceiverProfile) -> bool {
        if let Some(time) = self.current.position_velocity.time {
            self.current.timestamp = u64::from(time.num_seconds_from_midnight()) * 1000;
        } else if self.current.timestamp > 0 {
            self.current.timestamp += profile.update_interval_ms();
        }
        self.current.timestamp > 0
    }

    /// Roll the current snapshot into the previous slot and reset the
    /// current one. The timestamp carries over so the next cycle can be
    /// advanced from it when its fix lacks a time of day.
    pub fn rollover(&mut self) {
        self.previous = self.current;
        self.current = CycleSnapshot {
            timestamp: self.previous.timestamp,
            ..Default::default()
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveTime;

    fn view_with_index(idx: u32, prn: u32) -> SatelliteView {
        let mut view = SatelliteView {
            total_sentences: Some(3),
            sentence_index: Some(idx),
            sats_in_view: Some(10),
            ..Default::default()
        };
        view.sats[0].prn = Some(prn);
        view
    }

    #[test]
    fn buffer_routes_by_sentence_index() {
        let mut buffer = SatelliteBuffer::default();
        buffer.insert(view_with_index(2, 17));
        buffer.insert(view_with_index(1, 3));
        assert_eq!(buffer.slots()[0].sats[0].prn, Some(3));
        assert_eq!(buffer.slots()[1].sats[0].prn, Some(17));
        assert_eq!(buffer.slots()[2], SatelliteView::default());
        // a later index never disturbs the other slots
        buffer.insert(view_with_index(2, 21));
        assert_eq!(buffer.slots()[0].sats[0].prn, Some(3));
        assert_eq!(buffer.slots()[1].sats[0].prn, Some(21));
    }

    #[test]
    fn buffer_drops_out_of_range_indices() {
        let mut buffer = SatelliteBuffer::default();
        buffer.insert(view_with_index(0, 1));
        buffer.insert(view_with_index(4, 1));
        buffer.insert(SatelliteView::default());
        assert_eq!(*buffer.slots(), <[SatelliteView; 3]>::default());
    }

    #[test]
    fn profile_triggers() {
        let rmc = Sentence::PositionVelocity(PositionVelocity::default());
        assert!(ReceiverProfile::Geko301.is_trigger(&Sentence::Route));
        assert!(!ReceiverProfile::Geko301.is_trigger(&rmc));
        assert!(ReceiverProfile::Z205.is_trigger(&rmc));
        assert!(!ReceiverProfile::Z205.is_trigger(&Sentence::Route));
    }

    #[test]
    fn profile_parses_from_cli_names() {
        assert_eq!("geko301".parse(), Ok(ReceiverProfile::Geko301));
        assert_eq!("z205".parse(), Ok(ReceiverProfile::Z205));
        assert!("sirf".parse::<ReceiverProfile>().is_err());
    }

    #[test]
    fn timestamp_from_time_of_day() {
        let mut state = CycleState::default();
        state.current.position_velocity.time = NaiveTime::from_hms_opt(16, 57, 46);
        assert!(state.close_cycle(ReceiverProfile::Geko301));
        assert_eq!(state.current.timestamp, 61_066_000);
    }

    #[test]
    fn timestamp_advances_by_interval_without_time_of_day() {
        let mut state = CycleState::default();
        state.current.timestamp = 61_066_000;
        assert!(state.close_cycle(ReceiverProfile::Geko301));
        assert_eq!(state.current.timestamp, 61_068_000);
        assert!(state.close_cycle(ReceiverProfile::Z205));
        assert_eq!(state.current.timestamp, 61_069_000);
    }

    #[test]
    fn no_flush_without_any_timestamp() {
        let mut state = CycleState::default();
        assert!(!state.close_cycle(ReceiverProfile::Geko301));
        assert_eq!(state.current.timestamp, 0);
    }

    #[test]
    fn rollover_snapshots_and_resets() {
        let mut state = CycleState::default();
        state.current.position_velocity.course = Some(131.9);
        state.current.fix_quality.hdop = Some(1.0);
        state.current.satellites.insert(view_with_index(1, 3));
        state.current.timestamp = 61_066_000;
        state.rollover();
        assert_eq!(state.previous.position_velocity.course, Some(131.9));
        assert_eq!(state.previous.timestamp, 61_066_000);
        assert_eq!(state.current.position_velocity, PositionVelocity::default());
        assert_eq!(state.current.fix_quality, FixQuality::default());
        assert_eq!(*state.current.satellites.slots(), <[SatelliteView; 3]>::default());
        // the timestamp survives the reset
        assert_eq!(state.current.timestamp, 61_066_000);
    }
}
