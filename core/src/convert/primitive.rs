use log::debug;

use super::format::{ByteOrder, FormatDescriptor};
use super::SetupError;

/// Result of one conversion call: how many output bytes were produced and how
/// many input bytes were consumed. Both may be less than what was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
  pub produced: usize,
  pub consumed: usize,
}

impl Conversion {
  pub fn none() -> Conversion {
    Conversion {
      produced: 0,
      consumed: 0,
    }
  }
}

/// Per-sample format translation engine.
///
/// `configure` may reject a format pair; implementations must keep their
/// previous configuration when they do. After a successful `configure`,
/// `convert` always succeeds, only varying in how much it produces and
/// consumes within the space offered.
pub trait ConversionPrimitive {
  fn configure(
    &mut self,
    input: &FormatDescriptor,
    output: &FormatDescriptor,
  ) -> Result<(), SetupError>;

  fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Conversion;
}

/// Integer PCM width and endianness converter.
///
/// Supports 8, 16, 24 and 32 bit interleaved integer samples in either byte
/// order, at equal sample rate and channel count. 8 bit samples are unsigned
/// per PCM convention, wider widths are signed. Operates on whole frames
/// only: a non frame-aligned input tail is left unconsumed.
pub struct PcmConverter {
  formats: Option<(FormatDescriptor, FormatDescriptor)>,
}

impl PcmConverter {
  pub fn new() -> PcmConverter {
    PcmConverter { formats: None }
  }

  fn check_supported(
    input: &FormatDescriptor,
    output: &FormatDescriptor,
  ) -> Result<(), SetupError> {
    let unsupported = |cause: String| SetupError::UnsupportedFormats { cause };

    for format in &[input, output] {
      match format.bits_per_sample {
        8 | 16 | 24 | 32 => {}
        bits => return Err(unsupported(format!("{} bits per sample", bits))),
      }
      if !format.interleaved {
        return Err(unsupported("non-interleaved samples".to_string()));
      }
      if format.channels == 0 {
        return Err(unsupported("zero channels".to_string()));
      }
    }
    if input.sample_rate != output.sample_rate {
      return Err(unsupported(format!(
        "sample rate {} -> {}",
        input.sample_rate, output.sample_rate
      )));
    }
    if input.channels != output.channels {
      return Err(unsupported(format!(
        "{} -> {} channels",
        input.channels, output.channels
      )));
    }
    Ok(())
  }
}

// Samples travel through a signed 32 bit intermediate aligned to the MSB.

/// Decodes one sample of `bytes.len()` bytes into the signed 32 bit
/// intermediate representation. 1-byte samples are unsigned PCM.
pub fn read_sample(bytes: &[u8], byte_order: ByteOrder) -> i32 {
  let raw = match byte_order {
    ByteOrder::Little => bytes
      .iter()
      .rev()
      .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)),
    ByteOrder::Big => bytes
      .iter()
      .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)),
  };

  match bytes.len() {
    1 => ((raw as i32) - 128) << 24,
    2 => ((raw as u16) as i16 as i32) << 16,
    3 => (((raw << 8) as i32) >> 8) << 8,
    _ => raw as i32,
  }
}

/// Encodes the signed 32 bit intermediate into a sample of `bytes.len()`
/// bytes in the given byte order.
pub fn write_sample(value: i32, bytes: &mut [u8], byte_order: ByteOrder) {
  let raw = match bytes.len() {
    1 => ((value >> 24) + 128) as u32,
    2 => ((value >> 16) as u16) as u32,
    3 => ((value >> 8) as u32) & 0x00FF_FFFF,
    _ => value as u32,
  };

  let width = bytes.len();
  for (i, byte) in bytes.iter_mut().enumerate() {
    let shift = match byte_order {
      ByteOrder::Little => 8 * i,
      ByteOrder::Big => 8 * (width - 1 - i),
    };
    *byte = ((raw >> shift) & 0xFF) as u8;
  }
}

impl ConversionPrimitive for PcmConverter {
  fn configure(
    &mut self,
    input: &FormatDescriptor,
    output: &FormatDescriptor,
  ) -> Result<(), SetupError> {
    Self::check_supported(input, output)?;

    debug!(
      "PCM conversion configured: {} bit {:?} -> {} bit {:?}",
      input.bits_per_sample, input.byte_order, output.bits_per_sample, output.byte_order
    );

    self.formats = Some((*input, *output));
    Ok(())
  }

  fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Conversion {
    let (in_format, out_format) = match self.formats {
      Some(formats) => formats,
      None => return Conversion::none(),
    };

    let in_frame = in_format.frame_size();
    let out_frame = out_format.frame_size();
    let frames = (input.len() / in_frame).min(output.len() / out_frame);
    if frames == 0 {
      return Conversion::none();
    }

    let in_sample = in_format.bytes_per_sample();
    let out_sample = out_format.bytes_per_sample();
    let samples = frames * usize::from(in_format.channels);

    for index in 0..samples {
      let src = &input[index * in_sample..(index + 1) * in_sample];
      let dest = &mut output[index * out_sample..(index + 1) * out_sample];
      let value = read_sample(src, in_format.byte_order);
      write_sample(value, dest, out_format.byte_order);
    }

    Conversion {
      produced: frames * out_frame,
      consumed: frames * in_frame,
    }
  }
}

#[cfg(test)]
mod test {
  use super::super::format::{ByteOrder, FormatDescriptor};
  use super::{Conversion, ConversionPrimitive, PcmConverter};

  fn format(bits: u16, byte_order: ByteOrder) -> FormatDescriptor {
    FormatDescriptor::new(44100, bits, 2, true, byte_order)
  }

  #[test]
  pub fn widens_16_to_32_little_endian() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(16, ByteOrder::Little), &format(32, ByteOrder::Little))
      .unwrap();

    let input = [0x34, 0x12, 0xFF, 0xFF]; // 0x1234, -1
    let mut output = [0u8; 8];
    let result = converter.convert(&input, &mut output);

    assert_eq!(result, Conversion { produced: 8, consumed: 4 });
    assert_eq!(&output[..4], &[0x00, 0x00, 0x34, 0x12]); // 0x12340000
    assert_eq!(&output[4..], &[0x00, 0x00, 0xFF, 0xFF]); // -65536
  }

  #[test]
  pub fn narrows_32_to_16_keeping_sign() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(32, ByteOrder::Little), &format(16, ByteOrder::Little))
      .unwrap();

    let input = [0x00, 0x00, 0x34, 0x12, 0x00, 0x00, 0xCC, 0xFF];
    let mut output = [0u8; 4];
    let result = converter.convert(&input, &mut output);

    assert_eq!(result, Conversion { produced: 4, consumed: 8 });
    assert_eq!(&output[..2], &[0x34, 0x12]);
    assert_eq!(&output[2..], &[0xCC, 0xFF]);
  }

  #[test]
  pub fn unsigned_8_bit_midpoint_maps_to_zero() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(8, ByteOrder::Little), &format(16, ByteOrder::Little))
      .unwrap();

    let input = [0x80, 0x00, 0xFF, 0x81];
    let mut output = [0u8; 8];
    converter.convert(&input, &mut output);

    assert_eq!(&output[..2], &[0x00, 0x00]); // silence stays silence
    assert_eq!(&output[2..4], &[0x00, 0x80]); // i16::MIN
    assert_eq!(&output[4..6], &[0x00, 0x7F]);
    assert_eq!(&output[6..8], &[0x00, 0x01]);
  }

  #[test]
  pub fn swaps_endianness_at_equal_width() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(16, ByteOrder::Big), &format(16, ByteOrder::Little))
      .unwrap();

    let input = [0x12, 0x34, 0xAB, 0xCD];
    let mut output = [0u8; 4];
    converter.convert(&input, &mut output);

    assert_eq!(&output, &[0x34, 0x12, 0xCD, 0xAB]);
  }

  #[test]
  pub fn round_trips_24_bit_values() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(24, ByteOrder::Little), &format(32, ByteOrder::Little))
      .unwrap();

    let input = [0x56, 0x34, 0x12, 0xAA, 0xBB, 0xFF]; // 0x123456, negative
    let mut output = [0u8; 8];
    converter.convert(&input, &mut output);

    assert_eq!(&output[..4], &[0x00, 0x56, 0x34, 0x12]);
    assert_eq!(&output[4..], &[0x00, 0xAA, 0xBB, 0xFF]);
  }

  #[test]
  pub fn converts_only_whole_frames_that_fit() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(16, ByteOrder::Little), &format(32, ByteOrder::Little))
      .unwrap();

    // 3 input frames offered but output space for 2, plus a ragged tail byte
    let input = [0u8; 13];
    let mut output = [0u8; 16];
    let result = converter.convert(&input, &mut output);

    assert_eq!(result, Conversion { produced: 16, consumed: 8 });
  }

  #[test]
  pub fn rejects_sample_rate_mismatch() {
    let mut converter = PcmConverter::new();
    let input = FormatDescriptor::new(44100, 16, 2, true, ByteOrder::Little);
    let output = FormatDescriptor::new(48000, 16, 2, true, ByteOrder::Little);
    assert!(converter.configure(&input, &output).is_err());
  }

  #[test]
  pub fn keeps_previous_configuration_on_rejected_pair() {
    let mut converter = PcmConverter::new();
    converter
      .configure(&format(16, ByteOrder::Little), &format(32, ByteOrder::Little))
      .unwrap();

    let bad = FormatDescriptor::new(44100, 12, 2, true, ByteOrder::Little);
    assert!(converter.configure(&bad, &format(32, ByteOrder::Little)).is_err());

    // still converting with the original 16 -> 32 setup
    let mut output = [0u8; 8];
    let result = converter.convert(&[0u8; 4], &mut output);
    assert_eq!(result, Conversion { produced: 8, consumed: 4 });
  }

  #[test]
  pub fn convert_before_configure_does_nothing() {
    let mut converter = PcmConverter::new();
    let mut output = [0u8; 8];
    assert_eq!(converter.convert(&[0u8; 8], &mut output), Conversion::none());
  }
}
