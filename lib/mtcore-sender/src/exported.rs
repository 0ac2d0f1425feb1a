// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use web_time::Instant;

/// Whether a cached sender is in use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExportState {
    /// Nobody is using the sender. It may be torn down once the deadline passes.
    Idle(Instant),
    /// The sender has been borrowed this many times and not yet given back.
    Borrowed(usize),
}

struct Entry<S> {
    state: ExportState,
    sender: Option<S>,
}

/// Senders connected to other datacenters, shared by reference counting.
///
/// Borrowing a sender that exists reuses it, even if it was idle. A sender is only
/// torn down by [`ExportedSenders::collect_idle`] once it has been idle for the grace period.
pub struct ExportedSenders<S: Clone> {
    grace: Duration,
    entries: Mutex<HashMap<i32, Arc<Mutex<Entry<S>>>>>,
}

impl<S: Clone> ExportedSenders<S> {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn entry(&self, dc_id: i32) -> Arc<Mutex<Entry<S>>> {
        let mut entries = self.entries.lock().await;
        Arc::clone(entries.entry(dc_id).or_insert_with(|| {
            Arc::new(Mutex::new(Entry {
                state: ExportState::Borrowed(0),
                sender: None,
            }))
        }))
    }

    /// Borrows the sender for `dc_id`, calling `connect` only if there is none.
    ///
    /// Concurrent borrows of the same datacenter wait for each other, so at most one
    /// connection is ever made.
    pub async fn borrow<F, Fut, E>(&self, dc_id: i32, connect: F) -> Result<S, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        let entry = self.entry(dc_id).await;
        let mut entry = entry.lock().await;

        let sender = match entry.sender.clone() {
            Some(sender) => sender,
            None => {
                debug!("exporting a new sender to dc {dc_id}");
                let sender = connect().await?;
                entry.sender = Some(sender.clone());
                sender
            }
        };

        entry.state = match entry.state {
            ExportState::Idle(_) => ExportState::Borrowed(1),
            ExportState::Borrowed(count) => ExportState::Borrowed(count + 1),
        };
        Ok(sender)
    }

    /// Gives back a sender obtained from [`ExportedSenders::borrow`].
    pub async fn give_back(&self, dc_id: i32, now: Instant) {
        let entry = self.entry(dc_id).await;
        let mut entry = entry.lock().await;
        entry.state = match entry.state {
            ExportState::Borrowed(1) => ExportState::Idle(now + self.grace),
            ExportState::Borrowed(count) if count > 1 => ExportState::Borrowed(count - 1),
            state => {
                warn!("gave back a sender to dc {dc_id} that was not borrowed");
                state
            }
        };
    }

    /// The state of the sender to `dc_id`, if one exists.
    pub async fn state(&self, dc_id: i32) -> Option<ExportState> {
        let entry = Arc::clone(self.entries.lock().await.get(&dc_id)?);
        let entry = entry.lock().await;
        entry.sender.as_ref().map(|_| entry.state)
    }

    /// Drops the senders that have been idle for longer than the grace period,
    /// returning the datacenters they belonged to.
    pub async fn collect_idle(&self, now: Instant) -> Vec<i32> {
        let entries = self.entries.lock().await;
        let mut collected = Vec::new();
        for (dc_id, entry) in entries.iter() {
            // A locked entry is being borrowed right now.
            let Ok(mut entry) = entry.try_lock() else {
                continue;
            };
            if let ExportState::Idle(deadline) = entry.state {
                if deadline <= now && entry.sender.take().is_some() {
                    debug!("dropping idle exported sender to dc {dc_id}");
                    collected.push(*dc_id);
                }
            }
        }
        collected.sort_unstable();
        collected
    }
}
