//! Cached board service
//!
//! Board loads are the most expensive call in the system, so loaded boards
//! are shared behind a mutex and reused until their entry expires. A cold
//! load is retried with a long pause, since the usual failure is the
//! remote shedding load.

use boardsync::Board;
use boardsync_common::{BoardError, Result};
use boardsync_http::Sleeper;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default lifetime of a cached board, five minutes
pub const BOARD_TTL_SECS: u64 = 300;

const LOAD_ATTEMPTS: u32 = 5;
const LOAD_RETRY_PAUSE: Duration = Duration::from_secs(20);

/// Producer of freshly loaded boards; the cache owns retries and expiry
pub trait BoardLoader: Send + Sync {
    fn load(&self, board_id: i64) -> Result<Board>;
}

struct CacheEntry {
    board: Arc<Mutex<Board>>,
    expires_at: Instant,
}

/// Expiring store of shared board instances
pub struct BoardCache {
    loader: Box<dyn BoardLoader>,
    entries: Mutex<HashMap<i64, CacheEntry>>,
    ttl: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl BoardCache {
    pub fn new(loader: Box<dyn BoardLoader>) -> Self {
        Self {
            loader,
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(BOARD_TTL_SECS),
            sleeper: Arc::new(boardsync_http::ThreadSleeper),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The shared instance of a board, loading it if absent or expired.
    /// Callers that hold the returned handle across the TTL keep working
    /// with the same instance; only new `get` calls observe expiry.
    pub fn get(&self, board_id: i64) -> Result<Arc<Mutex<Board>>> {
        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(&board_id) {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.board.clone());
                }
            }
        }

        let board = Arc::new(Mutex::new(self.load_with_retry(board_id)?));
        self.entries.lock().insert(
            board_id,
            CacheEntry {
                board: board.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(board)
    }

    /// An independent copy of the cached board, for callers that mutate
    /// row state without affecting other holders.
    pub fn get_copy(&self, board_id: i64) -> Result<Board> {
        let shared = self.get(board_id)?;
        let copy = shared.lock().clone();
        Ok(copy)
    }

    /// Drop a board so the next `get` reloads it
    pub fn expire(&self, board_id: i64) {
        self.entries.lock().remove(&board_id);
    }

    pub fn expire_all(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_with_retry(&self, board_id: i64) -> Result<Board> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.loader.load(board_id) {
                Ok(board) => {
                    tracing::debug!("loaded board [{}] on attempt {}", board_id, attempt);
                    return Ok(board);
                }
                Err(err) if attempt < LOAD_ATTEMPTS => {
                    tracing::warn!(
                        "board [{}] load attempt {} failed ({}), pausing before retry",
                        board_id,
                        attempt,
                        err
                    );
                    self.sleeper.sleep(LOAD_RETRY_PAUSE);
                }
                Err(err) => {
                    return Err(BoardError::BoardUnavailable(format!(
                        "giving up on board [{}] after {} attempts: {}",
                        board_id, attempt, err
                    )));
                }
            }
        }
    }
}
