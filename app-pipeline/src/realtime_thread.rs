#[cfg(any(target_os = "macos", target_os = "windows"))]
use audio_thread_priority::{
  demote_current_thread_from_real_time, promote_current_thread_to_real_time, RtPriorityHandle,
};

use failure::Fail;

#[derive(Debug, Fail)]
#[fail(display = "Thread could not be promoted to real time")]
pub struct PromoteError {}

/// Guard promoting the current thread to real-time audio priority for its
/// lifetime, where the platform supports it.
pub struct RealTimeAudioPriority {
  #[cfg(any(target_os = "macos", target_os = "windows"))]
  handle: Option<RtPriorityHandle>,
}

impl RealTimeAudioPriority {
  pub fn promote(sample_rate: u32, buffer_size: u32) -> Result<RealTimeAudioPriority, PromoteError> {
    Self::promote_rt(sample_rate, buffer_size)
  }

  #[cfg(any(target_os = "macos", target_os = "windows"))]
  fn promote_rt(sample_rate: u32, buffer_size: u32) -> Result<RealTimeAudioPriority, PromoteError> {
    promote_current_thread_to_real_time(buffer_size, sample_rate)
      .map(|handle| RealTimeAudioPriority {
        handle: Some(handle),
      })
      .map_err(|_err| PromoteError {})
  }

  #[cfg(any(target_os = "macos", target_os = "windows"))]
  fn demote_rt(&mut self) {
    self.handle.take().into_iter().for_each(|handle| {
      let _ = demote_current_thread_from_real_time(handle);
    });
  }

  #[cfg(not(any(target_os = "macos", target_os = "windows")))]
  fn promote_rt(_sample_rate: u32, _buffer_size: u32) -> Result<RealTimeAudioPriority, PromoteError> {
    Ok(RealTimeAudioPriority {})
  }

  #[cfg(not(any(target_os = "macos", target_os = "windows")))]
  fn demote_rt(&mut self) {}
}

impl Drop for RealTimeAudioPriority {
  fn drop(&mut self) {
    self.demote_rt();
  }
}
