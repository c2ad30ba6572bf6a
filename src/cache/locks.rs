use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::{StyleName, TileCoord};

type TileKey = (StyleName, TileCoord);

/// Per-(style, tile) write exclusion
///
/// Two sessions fetching the same tile serialize on its lock instead of
/// interleaving writes to the same cache file. Entries nobody holds are
/// pruned on every acquire, so the map stays as small as the number of
/// in-flight tiles.
#[derive(Debug, Default)]
pub struct TileLocks {
    locks: Mutex<HashMap<TileKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Guard returned by [`TileLocks::acquire`]; the tile is unlocked on drop
pub struct TileGuard {
    _guard: OwnedMutexGuard<()>,
}

impl TileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds the lock for this tile
    pub async fn acquire(&self, style: &StyleName, tile: TileCoord) -> TileGuard {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((style.clone(), tile))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        TileGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of tiles currently locked or awaited
    #[cfg(test)]
    pub fn active(&self) -> usize {
        let locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_tile_is_exclusive() {
        let locks = Arc::new(TileLocks::new());
        let style = StyleName::sanitize("OSM");
        let tile = TileCoord::new(3, 1, 2);

        let guard = locks.acquire(&style, tile).await;
        assert_eq!(locks.active(), 1);

        let contender = {
            let locks = Arc::clone(&locks);
            let style = style.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&style, tile).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_tiles_do_not_block() {
        let locks = TileLocks::new();
        let style = StyleName::sanitize("OSM");

        let _a = locks.acquire(&style, TileCoord::new(3, 1, 2)).await;
        let _b = locks.acquire(&style, TileCoord::new(3, 1, 3)).await;
        let _c = locks
            .acquire(&StyleName::sanitize("Other"), TileCoord::new(3, 1, 2))
            .await;

        assert_eq!(locks.active(), 3);
    }
}
