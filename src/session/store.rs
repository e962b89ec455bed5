//! # Player Store
//!
//! Four collections, each behind its own lock:
//!
//! | collection  | key            | value          |
//! |-------------|----------------|----------------|
//! | `pending`   | `ConnectionId` | `PlayerRecord` |
//! | `syncing`   | `ConnectionId` | `PlayerRecord` |
//! | `connected` | `ConnectionId` | `PlayerRecord` |
//! | `persisted` | `CertHash`     | `PlayerData`   |
//!
//! Every operation locks exactly one collection for a short critical section.
//! The only exception is [`PlayerStore::complete_sync`], which takes `syncing`
//! then `connected` (always in that order) so the move is never observable
//! half-done. Nothing here sends on a connection; callers take a
//! [`LockedMap::snapshot`] and broadcast after the locks are gone.

use crate::config::HOST_PLAYER_ID;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::{ConnectionHandle, ConnectionId};
use crate::session::player::{CertHash, PlayerData, PlayerRecord, PlayerState};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A map guarded by its own mutex
#[derive(Debug)]
pub struct LockedMap<K, V> {
    name: &'static str,
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> LockedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Scoped access; the lock is released when the guard drops, on every path
    pub fn lock(&self) -> Result<MutexGuard<'_, HashMap<K, V>>> {
        self.inner
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned(self.name))
    }

    pub fn try_get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.lock()?.get(key).cloned())
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    /// Insert a new entry. Returns false and leaves the map untouched if `key` exists.
    pub fn add(&self, key: K, value: V) -> Result<bool> {
        let mut map = self.lock()?;
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, value);
        Ok(true)
    }

    /// Insert or overwrite
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.lock()?.insert(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        Ok(self.lock()?.remove(key))
    }

    /// Immutable copy for iterating without holding the lock
    pub fn snapshot(&self) -> Result<Vec<(K, V)>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}

#[derive(Debug)]
pub struct PlayerStore {
    pending: LockedMap<ConnectionId, PlayerRecord>,
    syncing: LockedMap<ConnectionId, PlayerRecord>,
    connected: LockedMap<ConnectionId, PlayerRecord>,
    persisted: LockedMap<CertHash, PlayerData>,
    next_player_id: AtomicU16,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore {
    pub fn new() -> Self {
        Self {
            pending: LockedMap::new(constants::LOCK_PENDING),
            syncing: LockedMap::new(constants::LOCK_SYNCING),
            connected: LockedMap::new(constants::LOCK_CONNECTED),
            persisted: LockedMap::new(constants::LOCK_PERSISTED),
            next_player_id: AtomicU16::new(HOST_PLAYER_ID + 1),
        }
    }

    /// Store seeded with previously persisted player data
    pub fn with_persisted(saved: HashMap<CertHash, PlayerData>) -> Result<Self> {
        let store = Self::new();
        store.persisted.lock()?.extend(saved);
        Ok(store)
    }

    pub fn pending(&self) -> &LockedMap<ConnectionId, PlayerRecord> {
        &self.pending
    }

    pub fn syncing(&self) -> &LockedMap<ConnectionId, PlayerRecord> {
        &self.syncing
    }

    pub fn connected(&self) -> &LockedMap<ConnectionId, PlayerRecord> {
        &self.connected
    }

    pub fn persisted(&self) -> &LockedMap<CertHash, PlayerData> {
        &self.persisted
    }

    /// Next peer id. Ids start right after the host's and are never reused;
    /// once `u16::MAX` has been handed out every further call fails.
    pub fn assign_player_id(&self) -> Result<u16> {
        self.next_player_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next != 0).then(|| next.wrapping_add(1))
            })
            .map_err(|_| ProtocolError::PlayerIdsExhausted)
    }

    /// Register a freshly accepted connection as pending
    pub fn accept(&self, connection: ConnectionHandle) -> Result<()> {
        let id = connection.id();
        if !self.pending.add(id, PlayerRecord::pending(connection))? {
            return Err(ProtocolError::ProtocolViolation(format!(
                "{}: {id}",
                constants::ERR_ALREADY_REGISTERED
            )));
        }
        debug!(connection = %id, "Connection pending handshake");
        Ok(())
    }

    /// Remove a connection from pending in one critical section.
    /// `None` means it was never pending or a handshake already claimed it.
    pub fn take_pending(&self, id: ConnectionId) -> Result<Option<PlayerRecord>> {
        self.pending.remove(&id)
    }

    /// Move a record from syncing to connected without an observable gap
    pub fn complete_sync(&self, id: ConnectionId) -> Result<PlayerRecord> {
        let mut syncing = self.syncing.lock()?;
        let mut connected = self.connected.lock()?;
        let record = syncing.remove(&id).ok_or_else(|| {
            ProtocolError::ProtocolViolation(format!("{}: {id}", constants::ERR_NOT_SYNCING))
        })?;
        connected.insert(id, record.clone());
        Ok(record)
    }

    /// Drop a connection from whichever lifecycle collection holds it
    pub fn remove_everywhere(&self, id: ConnectionId) -> Result<Option<(PlayerState, PlayerRecord)>> {
        if let Some(record) = self.pending.remove(&id)? {
            return Ok(Some((PlayerState::Pending, record)));
        }
        if let Some(record) = self.syncing.remove(&id)? {
            return Ok(Some((PlayerState::Syncing, record)));
        }
        if let Some(record) = self.connected.remove(&id)? {
            return Ok(Some((PlayerState::Connected, record)));
        }
        Ok(None)
    }

    /// Every lifecycle collection that currently holds `id`.
    /// At quiescent points this has at most one element.
    pub fn locate(&self, id: ConnectionId) -> Result<Vec<PlayerState>> {
        let mut found = Vec::new();
        if self.pending.contains(&id)? {
            found.push(PlayerState::Pending);
        }
        if self.syncing.contains(&id)? {
            found.push(PlayerState::Syncing);
        }
        if self.connected.contains(&id)? {
            found.push(PlayerState::Connected);
        }
        Ok(found)
    }

    /// Update the persisted copy of a player's data; no-op before the cert is known
    pub fn save_player(&self, record: &PlayerRecord) -> Result<()> {
        if let Some(hash) = &record.cert_hash {
            self.persisted.put(hash.clone(), record.data.clone())?;
        }
        Ok(())
    }

    /// Copy of the persisted map, for writing to disk
    pub fn persisted_snapshot(&self) -> Result<HashMap<CertHash, PlayerData>> {
        Ok(self.persisted.lock()?.clone())
    }
}
