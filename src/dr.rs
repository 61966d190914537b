//! Dead reckoning: yaw rate and differential rear wheel ticks derived
//! from two consecutive fixes.

use serde::{Deserialize, Serialize};

use crate::nmea::PositionVelocity;

/// Rear axle geometry used to turn speed and heading changes into
/// wheel ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleGeometry {
    /// Rear track width in m.
    pub track_width: f64,
    /// Wheel rolling circumference in m.
    pub wheel_circumference: f64,
    /// Wheel ticks per revolution.
    pub ticks_per_revolution: u32,
}

impl Default for VehicleGeometry {
    // VW Golf
    fn default() -> Self {
        Self {
            track_width: 1.525,
            wheel_circumference: 1.92,
            ticks_per_revolution: 96,
        }
    }
}

impl VehicleGeometry {
    /// Distance travelled per wheel tick in m.
    pub fn distance_per_pulse(&self) -> f64 {
        self.wheel_circumference / f64::from(self.ticks_per_revolution)
    }
}

/// Rear wheel ticks accumulated since the previous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelTicks {
    /// Rear left wheel.
    pub left: i32,
    /// Rear right wheel.
    pub right: i32,
}

/// Intermediate wheel-tick terms, kept so the driver can annotate the
/// output log when debugging is enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTrace {
    /// Elapsed time between the cycles in s.
    pub delta_t: f64,
    /// Heading change in degrees, counter-clockwise positive.
    pub delta_heading: f64,
    /// Distance per wheel tick in m.
    pub distance_per_pulse: f64,
    /// Average (straight-line) tick count, before truncation.
    pub avg_ticks: f64,
    /// Right-minus-left tick differential, before truncation.
    pub delta_ticks: f64,
}

/// Dead reckoning estimates for one cycle. Each field is absent when
/// its prerequisite inputs were absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeadReckoning {
    /// Yaw rate in degrees/s, counter-clockwise positive.
    pub yaw_rate: Option<f64>,
    /// Rear wheel ticks since the previous cycle.
    pub rear_ticks: Option<WheelTicks>,
    /// Intermediate terms behind `rear_ticks`.
    pub trace: Option<TickTrace>,
}

/// Change of heading from `prev` to `cur` in degrees, sign-flipped to
/// the counter-clockwise-positive yaw convention (course is clockwise)
/// and normalized into (-180, 180].
fn heading_change(cur: f64, prev: f64) -> f64 {
    let mut delta = -(cur - prev);
    delta = delta.rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Estimate yaw rate and rear wheel ticks from two consecutive fixes.
///
/// Yaw rate needs both courses and a strictly positive elapsed time;
/// wheel ticks additionally need the current speed.
pub fn estimate(
    cur: &PositionVelocity,
    prev: &PositionVelocity,
    geometry: &VehicleGeometry,
    timestamp: u64,
    prev_timestamp: u64,
) -> DeadReckoning {
    let mut ret = DeadReckoning::default();
    let (course, prev_course) = match (cur.course, prev.course) {
        (Some(course), Some(prev_course)) => (course, prev_course),
        _ => return ret,
    };
    if timestamp <= prev_timestamp {
        return ret;
    }
    let delta_t = (timestamp - prev_timestamp) as f64 / 1000.0;
    let delta_heading = heading_change(course, prev_course);
    ret.yaw_rate = Some(delta_heading / delta_t);
    if let Some(speed) = cur.speed {
        // Wheel dead reckoning:
        //   heading change = (right - left) * distance_per_pulse / track
        //   speed = (right + left) / 2 * distance_per_pulse / delta_t
        let distance_per_pulse = geometry.distance_per_pulse();
        let avg_ticks = speed * delta_t / distance_per_pulse;
        let delta_ticks = delta_heading.to_radians() * geometry.track_width / distance_per_pulse;
        // Truncation toward zero; the fractional remainder is not
        // carried to the next cycle.
        ret.rear_ticks = Some(WheelTicks {
            left: (avg_ticks - delta_ticks / 2.0) as i32,
            right: (avg_ticks + delta_ticks / 2.0) as i32,
        });
        ret.trace = Some(TickTrace {
            delta_t,
            delta_heading,
            distance_per_pulse,
            avg_ticks,
            delta_ticks,
        });
    }
    ret
}
