//! Staged response output.
//!
//! Rendering writes into a pooled buffer, never the live response, so
//! headers go out only once rendering has fully succeeded and a late
//! failure still yields a clean error response. Buffers return to the
//! pool on drop, which covers every exit path including panics.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

const MAX_POOLED: usize = 32;

/// Shared pool of reusable render buffers.
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub(crate) fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Acquires a cleared buffer, scoped to the returned guard.
    pub(crate) fn acquire(self: &Arc<Self>) -> PooledBuf {
        let buf = self.buffers.lock().pop().unwrap_or_default();
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, mut buf: Vec<u8>) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED {
            buf.clear();
            buffers.push(buf);
        }
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// A buffer on loan from the pool. Returned on drop, unconditionally.
pub(crate) struct PooledBuf {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl PooledBuf {
    /// Copies the staged bytes out; the buffer itself goes back to the
    /// pool when the guard drops.
    pub(crate) fn to_bytes(&self) -> Bytes {
        match &self.buf {
            Some(buf) => Bytes::copy_from_slice(buf),
            None => Bytes::new(),
        }
    }
}

impl io::Write for PooledBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(buf) = &mut self.buf {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn staged_bytes_survive_guard_copy() {
        let pool = Arc::new(BufferPool::new());
        let mut buf = pool.acquire();
        buf.write_all(b"hello").unwrap();
        assert_eq!(buf.to_bytes().as_ref(), b"hello");
    }

    #[test]
    fn buffer_returns_to_pool_on_drop() {
        let pool = Arc::new(BufferPool::new());
        {
            let mut buf = pool.acquire();
            buf.write_all(b"staged").unwrap();
        }
        assert_eq!(pool.pooled(), 1);
        // The recycled buffer comes back cleared.
        let buf = pool.acquire();
        assert_eq!(buf.to_bytes().len(), 0);
    }

    #[test]
    fn buffer_returns_even_when_rendering_panics() {
        let pool = Arc::new(BufferPool::new());
        let pool2 = Arc::clone(&pool);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut buf = pool2.acquire();
            buf.write_all(b"partial").unwrap();
            panic!("render failed mid-write");
        }));
        assert!(result.is_err());
        assert_eq!(pool.pooled(), 1);
    }
}
