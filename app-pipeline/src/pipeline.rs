use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use failure::Fail;
use log::{debug, info, trace, warn};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use pcm_pipeline_core::convert::{
  new_chunk_pool, read_sample, BufferingTrigger, ByteBuffer, ConverterUnit, FormatDescriptor,
  OutputActivity, StepOutcome,
};

use crate::config::Pipeline as PipelineConfig;
use crate::realtime_thread::RealTimeAudioPriority;

#[derive(Debug, Fail)]
pub enum PipelineError {
  #[fail(display = "Failed to start the pipeline threads: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the pipeline threads")]
  Stop,
}

pub enum BufferingProtocol {
  Buffer,
  Stop,
}

pub enum SinkProtocol {
  Drained { chunk: Box<ByteBuffer>, bytes: usize },
  Stop,
}

/// Trigger handle backed by the buffering thread's channel.
pub struct ChannelTrigger {
  tx: Sender<BufferingProtocol>,
}

impl ChannelTrigger {
  pub fn new(tx: Sender<BufferingProtocol>) -> ChannelTrigger {
    ChannelTrigger { tx }
  }
}

impl BufferingTrigger for ChannelTrigger {
  fn signal(&self) {
    drop(self.tx.send(BufferingProtocol::Buffer));
  }
}

pub struct Report {
  pub callbacks: usize,
  pub drained_bytes: usize,
  pub underruns: usize,
  pub peak: i32,
}

struct SinkStats {
  drained_bytes: usize,
  peak: i32,
}

pub struct Pipeline {
  buffering_tx: Sender<BufferingProtocol>,
  buffering_handle: JoinHandle<()>,
  callback_handle: JoinHandle<usize>,
  sink_handle: JoinHandle<SinkStats>,
  callbacks: usize,
}

impl Pipeline {
  pub fn start(
    unit: Arc<ConverterUnit>,
    activity: OutputActivity,
    output_format: FormatDescriptor,
    config: &PipelineConfig,
    buffering_tx: Sender<BufferingProtocol>,
    buffering_rx: Receiver<BufferingProtocol>,
  ) -> Result<Pipeline, PipelineError> {
    info!("Starting pipeline threads ...");

    let start_error = |err: std::io::Error| PipelineError::Start {
      cause: err.to_string(),
    };

    let (sink_tx, sink_rx) = crossbeam_channel::unbounded::<SinkProtocol>();
    let (release_tx, release_rx) = crossbeam_channel::unbounded::<Box<ByteBuffer>>();

    let buffering_handle = Self::start_buffering(
      unit.clone(),
      buffering_rx,
      Duration::from_millis(config.buffering_period_millis),
    )
    .map_err(start_error)?;

    let callback_bytes = output_format.bytes_for_frames(config.callback_frames);
    let callback_handle = Self::start_output_callback(
      unit,
      activity,
      output_format,
      config,
      callback_bytes,
      sink_tx,
      release_rx,
    )
    .map_err(start_error)?;

    let sink_handle =
      Self::start_sink(output_format, sink_rx, release_tx).map_err(start_error)?;

    Ok(Pipeline {
      buffering_tx,
      buffering_handle,
      callback_handle,
      sink_handle,
      callbacks: config.run_callbacks,
    })
  }

  /// Waits for the output callback thread to finish its run, then stops the
  /// remaining threads and gathers the run report.
  pub fn wait(self) -> Result<Report, PipelineError> {
    let underruns = self.callback_handle.join().map_err(|_| PipelineError::Stop)?;

    drop(self.buffering_tx.send(BufferingProtocol::Stop));
    self.buffering_handle.join().map_err(|_| PipelineError::Stop)?;

    let stats = self.sink_handle.join().map_err(|_| PipelineError::Stop)?;

    Ok(Report {
      callbacks: self.callbacks,
      drained_bytes: stats.drained_bytes,
      underruns,
      peak: stats.peak,
    })
  }

  // Producer context: runs buffering attempts when the converter signals its
  // trigger, with a periodic fallback tick so a quiet trigger cannot stall
  // the pipeline.
  fn start_buffering(
    unit: Arc<ConverterUnit>,
    rx: Receiver<BufferingProtocol>,
    period: Duration,
  ) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("buffering".into()).spawn(move || {
      debug!("Buffering thread started");
      loop {
        match rx.recv_timeout(period) {
          Ok(BufferingProtocol::Stop) | Err(RecvTimeoutError::Disconnected) => break,
          Ok(BufferingProtocol::Buffer) | Err(RecvTimeoutError::Timeout) => {
            while unit.is_ready_for_buffering() {
              match unit.step() {
                StepOutcome::Converted { produced, consumed } => {
                  trace!("Buffered {} bytes from {}", produced, consumed);
                }
                _ => break,
              }
            }
          }
        }
      }
      debug!("Buffering thread finished");
    })
  }

  // Consumer context: simulates the device output callback, draining one
  // callback's worth of converted bytes per period into pooled chunks.
  fn start_output_callback(
    unit: Arc<ConverterUnit>,
    activity: OutputActivity,
    output_format: FormatDescriptor,
    config: &PipelineConfig,
    callback_bytes: usize,
    sink_tx: Sender<SinkProtocol>,
    release_rx: Receiver<Box<ByteBuffer>>,
  ) -> std::io::Result<JoinHandle<usize>> {
    let period = Duration::from_millis(config.callback_period_millis);
    let run_callbacks = config.run_callbacks;
    let pool_capacity = config.chunk_pool.pool_capacity;
    let sample_rate = output_format.sample_rate;
    let frames = config.callback_frames as u32;

    thread::Builder::new().name("output-callback".into()).spawn(move || {
      let _rta_priority = match RealTimeAudioPriority::promote(sample_rate, frames) {
        Ok(handle) => {
          debug!("Output callback thread has real-time priority");
          Some(handle)
        }
        Err(err) => {
          warn!("Output callback thread stays at normal priority: {}", err);
          None
        }
      };

      let mut pool = new_chunk_pool(pool_capacity, callback_bytes);
      let mut underruns = 0;

      for _ in 0..run_callbacks {
        thread::sleep(period);

        while let Ok(chunk) = release_rx.try_recv() {
          pool.release(chunk);
        }

        let mut chunk = pool.get_or_alloc();
        activity.set_draining(true);
        let bytes = unit.shift_bytes(callback_bytes, chunk.slice_mut(callback_bytes));
        activity.set_draining(false);

        if bytes > 0 {
          drop(sink_tx.send(SinkProtocol::Drained { chunk, bytes }));
        } else {
          trace!("Output callback underrun");
          underruns += 1;
          pool.release(chunk);
        }
      }

      drop(sink_tx.send(SinkProtocol::Stop));
      debug!("Output callback thread finished, {} underruns", underruns);
      underruns
    })
  }

  // Sink context: accounts for the drained bytes and recycles the chunks
  // back to the callback thread's pool.
  fn start_sink(
    output_format: FormatDescriptor,
    rx: Receiver<SinkProtocol>,
    release_tx: Sender<Box<ByteBuffer>>,
  ) -> std::io::Result<JoinHandle<SinkStats>> {
    let sample = output_format.bytes_per_sample();
    let byte_order = output_format.byte_order;

    thread::Builder::new().name("sink".into()).spawn(move || {
      let mut stats = SinkStats {
        drained_bytes: 0,
        peak: 0,
      };

      for msg in rx.iter() {
        match msg {
          SinkProtocol::Drained { chunk, bytes } => {
            stats.drained_bytes += bytes;
            for sample_bytes in chunk.slice(bytes).chunks(sample).filter(|s| s.len() == sample) {
              let value = read_sample(sample_bytes, byte_order);
              stats.peak = stats.peak.max(value.saturating_abs());
            }
            drop(release_tx.send(chunk));
          }
          SinkProtocol::Stop => break,
        }
      }

      debug!(
        "Sink thread finished, {} bytes drained, peak {}",
        stats.drained_bytes, stats.peak
      );
      stats
    })
  }
}
