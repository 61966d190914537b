#![deny(missing_docs)]
//! Command line front end for the NMEA to positioning log converter.

use nmea2poslog::{convert_file, ConverterCfg};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg: ConverterCfg = argh::from_env();
    if cfg.save_vehicle {
        let geometry = cfg.geometry();
        if let Err(err) = geometry.store_default() {
            log::warn!("could not save vehicle geometry: {err}");
        }
    }
    if let Err(err) = convert_file(&cfg) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
