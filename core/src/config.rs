use serde_derive::Deserialize;

/// Converter tuning parameters.
///
/// `buffer_callbacks` sizes the conversion buffer as a multiple of one output
/// callback's worth of frames; `max_buffer_bytes` caps it. `max_chunk_bytes`
/// bounds how much raw input a single buffering step may pull.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Converter {
  pub buffer_callbacks: usize,
  pub max_buffer_bytes: usize,
  pub max_chunk_bytes: usize,
}

impl Default for Converter {
  fn default() -> Converter {
    Converter {
      buffer_callbacks: 4,
      max_buffer_bytes: 1024 * 1024,
      max_chunk_bytes: 16 * 1024,
    }
  }
}
