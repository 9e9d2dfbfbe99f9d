//! Sensor Anomaly - command line entry point
//!
//! ```text
//! sensor-anomaly train <history.json>
//! sensor-anomaly detect <sensor_id> <timestamp> <reading.json>
//! sensor-anomaly status
//! ```

use std::path::Path;
use std::process::ExitCode;

use sensor_anomaly::constants::{APP_NAME, APP_VERSION};
use sensor_anomaly::{DetectionService, DetectorConfig, Payload};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const USAGE: &str = "usage:
  sensor-anomaly train <history.json>
  sensor-anomaly detect <sensor_id> <timestamp> <reading.json>
  sensor-anomaly status";

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> CliResult<()> {
    let config = DetectorConfig::from_env();
    let service = DetectionService::new(config)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["train", path] => {
            let readings = read_payload(path)?.into_batch()?;
            let result = service.train(&readings)?;
            print_json(&result)
        }
        ["detect", sensor_id, timestamp, path] => {
            let reading = read_payload(path)?.into_single()?;
            let result = service.detect(sensor_id, timestamp, &reading)?;
            print_json(&result)
        }
        ["status"] => print_json(&service.status()),
        _ => Err(USAGE.into()),
    }
}

fn read_payload(path: &str) -> CliResult<Payload> {
    let data = std::fs::read(Path::new(path))?;
    let value: serde_json::Value = serde_json::from_slice(&data)?;
    Ok(Payload::from_json(&value)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
