use serde_derive::Deserialize;

pub type SampleRate = u32;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
  #[serde(rename = "little")]
  Little,
  #[serde(rename = "big")]
  Big,
}

/// PCM layout descriptor. Two descriptors describe the same layout iff all
/// fields match.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
  pub sample_rate: SampleRate,
  pub bits_per_sample: u16,
  pub channels: u16,
  pub interleaved: bool,
  pub byte_order: ByteOrder,
}

impl FormatDescriptor {
  pub fn new(
    sample_rate: SampleRate,
    bits_per_sample: u16,
    channels: u16,
    interleaved: bool,
    byte_order: ByteOrder,
  ) -> FormatDescriptor {
    FormatDescriptor {
      sample_rate,
      bits_per_sample,
      channels,
      interleaved,
      byte_order,
    }
  }

  pub fn bytes_per_sample(&self) -> usize {
    usize::from(self.bits_per_sample) / 8
  }

  /// Size in bytes of one interleaved frame (one sample per channel).
  pub fn frame_size(&self) -> usize {
    self.bytes_per_sample() * usize::from(self.channels)
  }

  pub fn bytes_for_frames(&self, frames: usize) -> usize {
    self.frame_size() * frames
  }
}
