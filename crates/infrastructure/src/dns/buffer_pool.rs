use dnsmux_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Largest DNS message any transport carries.
pub const MAX_MESSAGE_SIZE: usize = 65535;

const DEFAULT_MAX_IDLE: usize = 1024;

/// Recycler for message-sized byte buffers.
///
/// `acquire` never blocks and never fails: an empty pool allocates. Buffers come
/// back through [`PooledBuffer`]'s `Drop`, so every exit path releases exactly once.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    total_created: AtomicU64,
    total_reused: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// `max_idle` caps how many released buffers are kept; extras are freed.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                max_idle,
                total_created: AtomicU64::new(0),
                total_reused: AtomicU64::new(0),
            }),
        }
    }

    pub fn acquire(&self) -> PooledBuffer {
        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let buf = match reused {
            Some(buf) => {
                self.inner.total_reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.inner.total_created.fetch_add(1, Ordering::Relaxed);
                vec![0u8; MAX_MESSAGE_SIZE]
            }
        };

        PooledBuffer {
            buf,
            pool: self.clone(),
        }
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() < MAX_MESSAGE_SIZE {
            debug!(capacity = buf.capacity(), "Dropping undersized buffer");
            return;
        }
        buf.resize(MAX_MESSAGE_SIZE, 0);

        let mut idle = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.inner.max_idle {
            idle.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_created: self.inner.total_created.load(Ordering::Relaxed),
            total_reused: self.inner.total_reused.load(Ordering::Relaxed),
            idle: self
                .inner
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total_created: u64,
    pub total_reused: u64,
    pub idle: usize,
}

/// A buffer on loan from a [`BufferPool`]; returned when dropped.
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl PooledBuffer {
    /// The whole 65535-byte region, ready to receive a message.
    pub fn read_region(&mut self) -> &mut [u8] {
        self.buf.resize(MAX_MESSAGE_SIZE, 0);
        &mut self.buf[..]
    }

    /// Encodes `message` in place and returns the encoded length.
    ///
    /// Fails with `EncodeError` rather than growing past [`MAX_MESSAGE_SIZE`].
    pub fn encode(&mut self, message: &Message) -> Result<usize, DomainError> {
        self.buf.clear();
        {
            let mut encoder = BinEncoder::new(&mut self.buf);
            message
                .emit(&mut encoder)
                .map_err(|e| DomainError::EncodeError(e.to_string()))?;
        }
        if self.buf.len() > MAX_MESSAGE_SIZE {
            return Err(DomainError::EncodeError(format!(
                "message is {} bytes (max {})",
                self.buf.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        Ok(self.buf.len())
    }

    /// Copies `bytes` into the buffer, rejecting anything larger than a DNS message.
    pub fn fill_from(&mut self, bytes: &[u8]) -> Result<usize, DomainError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(DomainError::DecodeError(format!(
                "message is {} bytes (max {})",
                bytes.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        self.read_region()[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
