use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use log::debug;

use pcm_pipeline_core::convert::{
  write_sample, FormatDescriptor, InputUnit, InputUnitRef, OutputActivity, OutputUnit,
};

/// Input unit producing a sine tone in its native PCM format.
pub struct SineInput {
  format: FormatDescriptor,
  frequency: f64,
  phase: f64,
}

impl SineInput {
  pub fn new(format: FormatDescriptor, frequency: f64) -> InputUnitRef {
    debug!("Sine input at {} Hz in {:?}", frequency, format);
    Arc::new(Mutex::new(SineInput {
      format,
      frequency,
      phase: 0.0,
    }))
  }
}

impl InputUnit for SineInput {
  fn format(&self) -> FormatDescriptor {
    self.format
  }

  fn pull(&mut self, dest: &mut [u8]) -> usize {
    let frame = self.format.frame_size();
    let sample = self.format.bytes_per_sample();
    let frames = dest.len() / frame;
    let step = 2.0 * PI * self.frequency / f64::from(self.format.sample_rate);

    for i in 0..frames {
      // -6 dBFS headroom so narrowing conversions stay comfortably in range
      let value = ((self.phase.sin() * 0.5) * f64::from(i32::max_value())) as i32;
      self.phase += step;
      if self.phase > 2.0 * PI {
        self.phase -= 2.0 * PI;
      }

      let offset = i * frame;
      for channel in 0..usize::from(self.format.channels) {
        let at = offset + channel * sample;
        write_sample(value, &mut dest[at..at + sample], self.format.byte_order);
      }
    }

    frames * frame
  }
}

/// Stand-in for a hardware output device: a fixed preferred callback size and
/// an activity flag the callback thread raises while it drains.
pub struct SimulatedOutput {
  format: FormatDescriptor,
  preferred_frames: usize,
  activity: OutputActivity,
}

impl SimulatedOutput {
  pub fn new(format: FormatDescriptor, preferred_frames: usize) -> SimulatedOutput {
    SimulatedOutput {
      format,
      preferred_frames,
      activity: OutputActivity::new(),
    }
  }
}

impl OutputUnit for SimulatedOutput {
  fn format(&self) -> FormatDescriptor {
    self.format
  }

  fn preferred_frames(&self) -> usize {
    self.preferred_frames
  }

  fn activity(&self) -> OutputActivity {
    self.activity.clone()
  }
}
