use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use failure;
use failure::{Error, Fail};

use pcm_pipeline_core::convert::{ConverterUnit, FormatDescriptor, OutputUnit, PcmConverter};

mod config;
use crate::config::Config;

mod pipeline;
use crate::pipeline::{ChannelTrigger, Pipeline};

mod realtime_thread;

mod units;
use crate::units::{SimulatedOutput, SineInput};

const PCM_PIPELINE_CONFIG: &'static str = "PCM_PIPELINE_CONFIG";
const DEFAULT_PCM_PIPELINE_CONFIG: &'static str = "pipeline.toml";

const PCM_PIPELINE_LOG_CONFIG: &'static str = "PCM_PIPELINE_LOG_CONFIG";
const DEFAULT_PCM_PIPELINE_LOG_CONFIG: &'static str = "log4rs.yaml";

const INPUT_TONE_HZ: f64 = 440.0;
const SWITCH_TONE_HZ: f64 = 880.0;

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },
}

fn main() -> Result<(), Error> {
  init_logging()?;

  let config = init_config()?;

  let (trigger_tx, trigger_rx) = crossbeam_channel::unbounded();

  let input = SineInput::new(config.input, INPUT_TONE_HZ);
  let trigger = Box::new(ChannelTrigger::new(trigger_tx.clone()));
  let unit = Arc::new(ConverterUnit::new(
    input,
    Box::new(PcmConverter::new()),
    trigger,
    &config.converter,
  ));
  info!("Converter session {}", unit.session_id());

  let output = SimulatedOutput::new(config.output, config.pipeline.callback_frames);
  unit.setup_with_output(&output)?;

  let pipeline = Pipeline::start(
    unit.clone(),
    output.activity(),
    config.output,
    &config.pipeline,
    trigger_tx,
    trigger_rx,
  )?;

  if let Some(switch_format) = config.switch_input {
    switch_input_mid_run(&unit, &config, switch_format);
  }

  let report = pipeline.wait()?;
  info!(
    "Pipeline done: {} callbacks, {} bytes drained, {} underruns, peak {}",
    report.callbacks, report.drained_bytes, report.underruns, report.peak
  );

  Ok(())
}

// Control context: waits until the configured callback index comes around and
// rebinds the converter to a new input format while the other threads run.
fn switch_input_mid_run(unit: &ConverterUnit, config: &Config, format: FormatDescriptor) {
  let delay =
    config.pipeline.callback_period_millis * config.pipeline.switch_at_callback as u64;
  thread::sleep(Duration::from_millis(delay));

  let next_input = SineInput::new(format, SWITCH_TONE_HZ);
  match unit.reinit_with_input(next_input, config.pipeline.switch_flush) {
    Ok(()) => info!(
      "Switched input to {:?} (flush: {})",
      format, config.pipeline.switch_flush
    ),
    Err(err) => warn!("Input switch rejected: {}", err),
  }
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(PCM_PIPELINE_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_PCM_PIPELINE_LOG_CONFIG.to_string());

  log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
    MainError::LoggingInit {
      cause: err.to_string(),
    }
  })?;

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path =
    std::env::var(PCM_PIPELINE_CONFIG).unwrap_or_else(|_| DEFAULT_PCM_PIPELINE_CONFIG.to_string());

  info!("Loading pipeline configuration from {} ...", config_path);
  let config = Config::from_file(config_path.as_str())?;
  debug!("{:#?}", config);

  Ok(config)
}
