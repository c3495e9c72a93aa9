use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use uuid::Uuid;

use crate::config::Converter as ConverterConfig;

use super::buffer::ConversionBuffer;
use super::format::FormatDescriptor;
use super::primitive::ConversionPrimitive;
use super::SetupError;

/// Upstream source of raw PCM bytes.
///
/// `pull` fills as much of `dest` as it currently can; 0 means temporarily
/// empty, not end of stream.
pub trait InputUnit {
  fn format(&self) -> FormatDescriptor;
  fn pull(&mut self, dest: &mut [u8]) -> usize;
}

/// Downstream sink. Only consulted during setup: the unit keeps the cheap
/// activity handle afterwards, never the output unit itself.
pub trait OutputUnit {
  fn format(&self) -> FormatDescriptor;
  fn preferred_frames(&self) -> usize;
  fn activity(&self) -> OutputActivity;
}

/// Cloneable flag the output callback raises while it drains, checked by the
/// readiness predicate without taking any lock.
#[derive(Clone)]
pub struct OutputActivity(Arc<AtomicBool>);

impl OutputActivity {
  pub fn new() -> OutputActivity {
    OutputActivity(Arc::new(AtomicBool::new(false)))
  }

  pub fn set_draining(&self, draining: bool) {
    self.0.store(draining, Ordering::Release);
  }

  pub fn is_draining(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

/// Fire-and-forget handle into whatever schedules buffering attempts. The
/// unit signals it when a drain or a reconfiguration makes buffering
/// worthwhile again; it never manages scheduling policy itself.
pub trait BufferingTrigger {
  fn signal(&self);
}

pub type InputUnitRef = Arc<Mutex<dyn InputUnit + Send>>;

/// What a single buffering step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  /// No output format yet, nothing to convert into.
  NotConfigured,
  /// Free space below the readiness threshold; back off until a drain.
  Overrun,
  /// No input available this tick, or not enough yet for a whole frame.
  Underrun,
  Converted { produced: usize, consumed: usize },
}

// Producer/control half of the unit state. Guarded by its own mutex so the
// real-time drain path only ever contends on the conversion buffer.
struct ConvState {
  input: InputUnitRef,
  input_format: FormatDescriptor,
  output_format: Option<FormatDescriptor>,
  primitive: Box<dyn ConversionPrimitive + Send>,
  pending: Vec<u8>,
  scratch: Vec<u8>,
  min_free_bytes: usize,
  activity: Option<OutputActivity>,
}

/// Format-conversion stage between an input unit and an output unit.
///
/// Converted bytes accumulate in an internal fixed-capacity buffer that the
/// output side drains incrementally through `shift_bytes`. Three contexts may
/// call in concurrently: a trigger context running `step`, the output
/// callback running `shift_bytes`/`flush`, and a control context running
/// `setup_with_output`/`reinit_with_input`.
///
/// Lock order is always conversion state before buffer; the drain path takes
/// only the buffer lock and is O(bytes moved).
pub struct ConverterUnit {
  session_id: Uuid,
  config: ConverterConfig,
  conv: Mutex<ConvState>,
  buffer: Mutex<ConversionBuffer>,
  trigger: Box<dyn BufferingTrigger + Send + Sync>,
}

impl ConverterUnit {
  /// Binds the unit to an input source and a buffering trigger. The unit is
  /// not yet able to convert: `shift_bytes` returns 0 until
  /// `setup_with_output` succeeds.
  pub fn new(
    input: InputUnitRef,
    primitive: Box<dyn ConversionPrimitive + Send>,
    trigger: Box<dyn BufferingTrigger + Send + Sync>,
    config: &ConverterConfig,
  ) -> ConverterUnit {
    let session_id = Uuid::new_v4();
    let input_format = input.lock().unwrap().format();

    debug!("Converter {}: bound to input {:?}", session_id, input_format);

    ConverterUnit {
      session_id,
      config: config.clone(),
      conv: Mutex::new(ConvState {
        input,
        input_format,
        output_format: None,
        primitive,
        pending: Vec::new(),
        scratch: Vec::new(),
        min_free_bytes: 0,
        activity: None,
      }),
      buffer: Mutex::new(ConversionBuffer::new(0)),
      trigger,
    }
  }

  pub fn session_id(&self) -> Uuid {
    self.session_id
  }

  pub fn input_format(&self) -> FormatDescriptor {
    self.conv.lock().unwrap().input_format
  }

  pub fn output_format(&self) -> Option<FormatDescriptor> {
    self.conv.lock().unwrap().output_format
  }

  pub fn buffered_bytes(&self) -> usize {
    self.buffer.lock().unwrap().used()
  }

  /// Reads the output's format, configures the primitive for the current
  /// format pair and allocates the conversion buffer sized to
  /// `buffer_callbacks` output callbacks, capped at `max_buffer_bytes`.
  ///
  /// All fallible work happens before any state is swapped: on failure the
  /// unit keeps its previous configuration and buffer untouched.
  pub fn setup_with_output(&self, output: &dyn OutputUnit) -> Result<(), SetupError> {
    let mut conv = self.conv.lock().unwrap();
    let state = &mut *conv;

    let output_format = output.format();
    let frame = output_format.frame_size();
    if frame == 0 {
      return Err(SetupError::UnsupportedFormats {
        cause: "zero-sized output frame".to_string(),
      });
    }

    let callback_bytes = output_format.bytes_for_frames(output.preferred_frames());
    let capacity = (callback_bytes * self.config.buffer_callbacks).min(self.config.max_buffer_bytes);
    if capacity < frame {
      return Err(SetupError::BufferAllocation {
        cause: format!("capacity {} below one output frame", capacity),
      });
    }

    state.primitive.configure(&state.input_format, &output_format)?;

    let buffer = ConversionBuffer::new(capacity);
    let min_free_bytes = callback_bytes.min(capacity / 2).max(frame);

    state.output_format = Some(output_format);
    state.min_free_bytes = min_free_bytes;
    state.scratch = vec![0; capacity];
    state.activity = Some(output.activity());
    *self.buffer.lock().unwrap() = buffer;

    debug!(
      "Converter {}: configured {:?} -> {:?}, buffer {} bytes, readiness threshold {} bytes",
      self.session_id, state.input_format, output_format, capacity, min_free_bytes
    );

    self.trigger.signal();
    Ok(())
  }

  /// Rebinds to a new input source mid-stream.
  ///
  /// With `flush` the buffered converted bytes are discarded before
  /// returning, so no stale bytes ever mix with the new input's; without it
  /// they stay drainable in order. The stash of unconsumed raw input is
  /// dropped either way since it holds bytes in the old input's format.
  ///
  /// Fails (leaving the previous binding intact) if the primitive rejects the
  /// new format pair.
  pub fn reinit_with_input(&self, input: InputUnitRef, flush: bool) -> Result<(), SetupError> {
    let mut conv = self.conv.lock().unwrap();
    let state = &mut *conv;

    let input_format = input.lock().unwrap().format();

    if let Some(output_format) = state.output_format {
      state.primitive.configure(&input_format, &output_format)?;
    }

    state.input = input;
    state.input_format = input_format;
    state.pending.clear();

    if flush {
      self.buffer.lock().unwrap().flush();
    }

    debug!(
      "Converter {}: reinitialised for input {:?} (flush: {})",
      self.session_id, input_format, flush
    );

    if state.output_format.is_some() {
      self.trigger.signal();
    }
    Ok(())
  }

  /// One buffering attempt: pull raw input proportional to the free space,
  /// convert it, append the result. Unconsumed input stays in the pending
  /// stash and leads the next attempt.
  pub fn step(&self) -> StepOutcome {
    let mut conv = self.conv.lock().unwrap();
    let state = &mut *conv;

    let output_format = match state.output_format {
      Some(format) => format,
      None => return StepOutcome::NotConfigured,
    };

    let free = self.buffer.lock().unwrap().free();
    if free < state.min_free_bytes {
      trace!("Converter {}: step overrun, {} bytes free", self.session_id, free);
      return StepOutcome::Overrun;
    }

    let in_frame = state.input_format.frame_size();
    let out_frame = output_format.frame_size();
    let want = ((free / out_frame) * in_frame).min(self.config.max_chunk_bytes);

    if state.pending.len() < want {
      let offset = state.pending.len();
      state.pending.resize(want, 0);
      let pulled = state.input.lock().unwrap().pull(&mut state.pending[offset..]);
      state.pending.truncate(offset + pulled);
    }

    if state.pending.is_empty() {
      trace!("Converter {}: step underrun", self.session_id);
      return StepOutcome::Underrun;
    }

    let space = free.min(state.scratch.len());
    let result = state
      .primitive
      .convert(&state.pending, &mut state.scratch[..space]);

    state.pending.drain(..result.consumed);

    if result.produced > 0 {
      // the producer is the only appender and control calls hold the state
      // lock, so the free space checked above can only have grown since
      self.buffer.lock().unwrap().append(&state.scratch[..result.produced]);
    }

    if result.produced == 0 && result.consumed == 0 {
      // not even one whole frame yet; keep the tail for the next tick
      return StepOutcome::Underrun;
    }

    trace!(
      "Converter {}: buffered {} bytes from {} input bytes",
      self.session_id,
      result.produced,
      result.consumed
    );

    StepOutcome::Converted {
      produced: result.produced,
      consumed: result.consumed,
    }
  }

  /// Cheap, non-blocking readiness probe for the trigger context. A
  /// contended lock reports not-ready; the next tick simply retries.
  pub fn is_ready_for_buffering(&self) -> bool {
    let conv = match self.conv.try_lock() {
      Ok(guard) => guard,
      Err(_) => return false,
    };

    if conv.output_format.is_none() {
      return false;
    }

    if let Some(activity) = &conv.activity {
      if activity.is_draining() {
        return false;
      }
    }

    match self.buffer.try_lock() {
      Ok(buffer) => buffer.free() >= conv.min_free_bytes,
      Err(_) => false,
    }
  }

  /// Removes up to `amount` converted bytes from the head of the buffer into
  /// `dest`. Returns the actual count; 0 when empty or unconfigured. Never
  /// blocks beyond the brief buffer lock and costs only the bytes moved.
  pub fn shift_bytes(&self, amount: usize, dest: &mut [u8]) -> usize {
    let amount = amount.min(dest.len());

    let mut buffer = self.buffer.lock().unwrap();
    let free_before = buffer.free();
    let shifted = buffer.shift(&mut dest[..amount]);
    let free_after = buffer.free();
    drop(buffer);

    self.signal_on_threshold_crossing(free_before, free_after);
    shifted
  }

  /// Discards all buffered converted bytes.
  pub fn flush(&self) {
    let mut buffer = self.buffer.lock().unwrap();
    let free_before = buffer.free();
    buffer.flush();
    let free_after = buffer.free();
    drop(buffer);

    debug!("Converter {}: buffer flushed", self.session_id);
    self.signal_on_threshold_crossing(free_before, free_after);
  }

  // Wakes the trigger only on the upward crossing of the readiness
  // threshold, so a drain running every few milliseconds does not spam the
  // scheduler. Skipped when the state lock is contended: whoever holds it
  // will signal on its own once done.
  fn signal_on_threshold_crossing(&self, free_before: usize, free_after: usize) {
    if let Ok(conv) = self.conv.try_lock() {
      if conv.output_format.is_some()
        && free_before < conv.min_free_bytes
        && free_after >= conv.min_free_bytes
      {
        self.trigger.signal();
      }
    }
  }
}
