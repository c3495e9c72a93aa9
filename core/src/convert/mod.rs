pub mod buffer;
pub mod format;
pub mod primitive;
pub mod unit;

pub use buffer::ConversionBuffer;
pub use format::{ByteOrder, FormatDescriptor, SampleRate};
pub use primitive::{read_sample, write_sample, Conversion, ConversionPrimitive, PcmConverter};
pub use unit::{
  BufferingTrigger, ConverterUnit, InputUnit, InputUnitRef, OutputActivity, OutputUnit,
  StepOutcome,
};

use std::ops::{Deref, DerefMut};

use failure::Fail;

use crate::pool::Pool;

#[derive(Debug, Fail)]
pub enum SetupError {
  #[fail(display = "Unsupported format pair: {}", cause)]
  UnsupportedFormats { cause: String },

  #[fail(display = "Failed to allocate the conversion buffer: {}", cause)]
  BufferAllocation { cause: String },
}

/// Owned chunk of raw bytes cycled through the pipeline threads.
pub struct ByteBuffer(Vec<u8>);

impl ByteBuffer {
  pub fn with_capacity(capacity: usize) -> ByteBuffer {
    ByteBuffer(vec![0; capacity])
  }

  pub fn slice(&self, size: usize) -> &[u8] {
    &self.0[0..size]
  }

  pub fn slice_mut(&mut self, size: usize) -> &mut [u8] {
    &mut self.0[0..size]
  }
}

impl Deref for ByteBuffer {
  type Target = Vec<u8>;
  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl DerefMut for ByteBuffer {
  fn deref_mut(&mut self) -> &mut Vec<u8> {
    &mut self.0
  }
}

pub fn new_chunk_pool(pool_capacity: usize, chunk_capacity: usize) -> Pool<ByteBuffer> {
  let allocator = Box::new(move || Box::new(ByteBuffer::with_capacity(chunk_capacity)));
  let reset = Box::new(|_item: &mut ByteBuffer| {});
  Pool::new(pool_capacity, allocator, reset)
}
