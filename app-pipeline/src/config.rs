use failure;
use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use pcm_pipeline_core::config::Converter;
use pcm_pipeline_core::convert::{ByteOrder, FormatDescriptor};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
  pub input: FormatDescriptor,
  pub output: FormatDescriptor,
  /// Input format to switch to mid-run, exercising the converter reinit.
  pub switch_input: Option<FormatDescriptor>,
  pub pipeline: Pipeline,
  pub converter: Converter,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      input: FormatDescriptor::new(44100, 16, 2, true, ByteOrder::Little),
      output: FormatDescriptor::new(44100, 32, 2, true, ByteOrder::Little),
      switch_input: None,
      pipeline: Pipeline::default(),
      converter: Converter::default(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  #[allow(dead_code)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PoolCapacity {
  pub pool_capacity: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Pipeline {
  /// Frames the simulated output drains per callback.
  pub callback_frames: usize,
  pub callback_period_millis: u64,
  /// Fallback cadence for buffering attempts when no trigger fires.
  pub buffering_period_millis: u64,
  /// Output callbacks to run before stopping.
  pub run_callbacks: usize,
  /// Callback index at which to switch to `switch_input`, if set.
  pub switch_at_callback: usize,
  /// Whether the mid-run switch flushes already converted bytes.
  pub switch_flush: bool,
  pub chunk_pool: PoolCapacity,
}

impl Default for Pipeline {
  fn default() -> Pipeline {
    Pipeline {
      callback_frames: 512,
      callback_period_millis: 10,
      buffering_period_millis: 5,
      run_callbacks: 200,
      switch_at_callback: 100,
      switch_flush: true,
      chunk_pool: PoolCapacity { pool_capacity: 8 },
    }
  }
}

#[cfg(test)]
mod test {
  use super::Config;
  use pcm_pipeline_core::convert::ByteOrder;

  #[test]
  pub fn defaults_when_empty() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config.input.sample_rate, 44100);
    assert_eq!(config.output.bits_per_sample, 32);
    assert!(config.switch_input.is_none());
    assert_eq!(config.pipeline.callback_frames, 512);
  }

  #[test]
  pub fn parses_formats_from_toml() {
    let config = Config::from_str(
      r#"
      [input]
      sample_rate = 48000
      bits_per_sample = 24
      channels = 2
      interleaved = true
      byte_order = "big"

      [pipeline]
      run_callbacks = 50
      "#,
    )
    .unwrap();
    assert_eq!(config.input.sample_rate, 48000);
    assert_eq!(config.input.bits_per_sample, 24);
    assert_eq!(config.input.byte_order, ByteOrder::Big);
    assert_eq!(config.pipeline.run_callbacks, 50);
    assert_eq!(config.pipeline.switch_at_callback, 100);
  }
}
