//! Flat converter configuration: command line surface plus a persisted
//! vehicle-geometry default.

use std::path::PathBuf;

use argh::FromArgs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cycle::ReceiverProfile;
use crate::dr::VehicleGeometry;

#[derive(FromArgs, Serialize, Deserialize, Debug)]
/// Convert an NMEA 0183 log into the positioning log format.
pub struct ConverterCfg {
    /// NMEA file read as input
    #[argh(positional)]
    pub nmea_log: PathBuf,
    /// positioning log file written as output
    #[argh(positional)]
    pub positioning_log: PathBuf,
    /// GPS receiver type: geko301 (Garmin Geko 301) or z205 (Becker PND
    /// Z205)
    #[argh(option, default = "ReceiverProfile::Geko301")]
    pub receiver_type: ReceiverProfile,
    /// rear track width of the vehicle in m
    #[argh(option)]
    pub track: Option<f64>,
    /// wheel rolling circumference in m
    #[argh(option)]
    pub wheel_circ: Option<f64>,
    /// number of wheel ticks per revolution
    #[argh(option)]
    pub wheel_tick_rev: Option<u32>,
    /// derive sensor data (speed, gyroscope, wheel ticks) from the fixes
    #[argh(switch)]
    pub sns: bool,
    /// write debug annotations to the output file
    #[argh(switch)]
    pub debug: bool,
    /// save the resolved vehicle geometry as the default for later runs
    #[argh(switch)]
    pub save_vehicle: bool,
}

impl ConverterCfg {
    /// Resolve the vehicle geometry: explicit flags override the stored
    /// default, which overrides the built-in values.
    pub fn geometry(&self) -> VehicleGeometry {
        let base = VehicleGeometry::load_default().unwrap_or_default();
        VehicleGeometry {
            track_width: self.track.unwrap_or(base.track_width),
            wheel_circumference: self.wheel_circ.unwrap_or(base.wheel_circumference),
            ticks_per_revolution: self.wheel_tick_rev.unwrap_or(base.ticks_per_revolution),
        }
    }
}

impl VehicleGeometry {
    /// Store this geometry as the default in the platform config
    /// directory.
    pub fn store_default(&self) -> Result<(), std::io::Error> {
        let mut path = get_default_path();
        std::fs::create_dir_all(&path)?;
        path.push("vehicle.json");
        std::fs::write(
            path,
            serde_json::to_string(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        )
    }

    /// Load the stored default geometry, if one was saved.
    pub fn load_default() -> Result<Self, std::io::Error> {
        let mut path = get_default_path();
        path.push("vehicle.json");
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

fn get_default_path() -> PathBuf {
    if let Some(path) = ProjectDirs::from("", "", "nmea2poslog") {
        path.config_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
