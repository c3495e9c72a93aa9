//! Fixed-capacity circular FIFO for converted bytes.

/// The producer appends at the tail, the consumer shifts from the head and
/// both cursors wrap around the backing storage, so a shift costs only the
/// bytes moved and never a full-buffer compaction.
pub struct ConversionBuffer {
  data: Vec<u8>,
  head: usize,
  used: usize,
}

impl ConversionBuffer {
  pub fn new(capacity: usize) -> ConversionBuffer {
    ConversionBuffer {
      data: vec![0; capacity],
      head: 0,
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.data.len()
  }

  pub fn used(&self) -> usize {
    self.used
  }

  pub fn free(&self) -> usize {
    self.data.len() - self.used
  }

  pub fn is_empty(&self) -> bool {
    self.used == 0
  }

  /// Appends bytes at the tail, writing only what fits in the free space.
  /// Returns the number of bytes actually written.
  pub fn append(&mut self, bytes: &[u8]) -> usize {
    let capacity = self.data.len();
    let amount = bytes.len().min(self.free());
    if amount == 0 {
      return 0;
    }

    let tail = (self.head + self.used) % capacity;
    let first = amount.min(capacity - tail);
    self.data[tail..tail + first].copy_from_slice(&bytes[..first]);
    if first < amount {
      self.data[..amount - first].copy_from_slice(&bytes[first..amount]);
    }

    self.used += amount;
    amount
  }

  /// Removes bytes from the head into `dest`, copying at most `dest.len()`
  /// and at most the bytes currently held. Returns the number copied.
  pub fn shift(&mut self, dest: &mut [u8]) -> usize {
    let capacity = self.data.len();
    let amount = dest.len().min(self.used);
    if amount == 0 {
      return 0;
    }

    let first = amount.min(capacity - self.head);
    dest[..first].copy_from_slice(&self.data[self.head..self.head + first]);
    if first < amount {
      dest[first..amount].copy_from_slice(&self.data[..amount - first]);
    }

    self.head = (self.head + amount) % capacity;
    self.used -= amount;
    amount
  }

  /// Discards everything currently held.
  pub fn flush(&mut self) {
    self.head = 0;
    self.used = 0;
  }
}
