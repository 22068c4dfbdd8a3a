//! Per-device connection handle table

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::sync::lock;
use crate::transport::{Connection, ConnectionHandle};

#[derive(Debug)]
struct TableState {
    /// Next handle to issue; every handle below it has been issued once
    next: ConnectionHandle,
    entries: HashMap<ConnectionHandle, Connection>,
}

/// Maps opaque handles to live connections.
///
/// Handles start at 1 and only grow, so a value is never issued twice
/// during the lifetime of the table.
#[derive(Debug)]
pub struct HandleTable {
    state: Mutex<TableState>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                next: 1,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn add(&self, connection: Connection) -> Result<ConnectionHandle> {
        let mut state = lock(&self.state);
        let handle = state.next;
        state.next = handle.checked_add(1).ok_or(Error::ResourceLimitReached)?;
        state.entries.insert(handle, connection);
        Ok(handle)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Result<Connection> {
        lock(&self.state).entries.get(&handle).cloned().ok_or(Error::NotFound)
    }

    /// Like [`get`](Self::get), but reports handles that were issued and have
    /// since been closed as `ConnectionClosed`
    pub fn lookup(&self, handle: ConnectionHandle) -> Result<Connection> {
        let state = lock(&self.state);
        match state.entries.get(&handle) {
            Some(connection) => Ok(connection.clone()),
            None if handle != 0 && handle < state.next => Err(Error::ConnectionClosed),
            None => Err(Error::NotFound),
        }
    }

    /// Removes `handle`, returning the connection only to the first caller
    pub fn remove(&self, handle: ConnectionHandle) -> Option<Connection> {
        lock(&self.state).entries.remove(&handle)
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        lock(&self.state).entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).entries.is_empty()
    }

    /// Live handles, ascending
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        let mut handles: Vec<_> = lock(&self.state).entries.keys().copied().collect();
        handles.sort_unstable();
        handles
    }
}
