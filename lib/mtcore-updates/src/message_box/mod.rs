// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Correct handling of updates, including gaps, and knowing when the code should "get
//! difference" (the set of updates the client should know by now minus the set of updates
//! that it actually knows).
//!
//! Every update stream has its own [`Entry`] in the [`MessageBox`]. An entry is either having
//! its difference fetched (it is in [`MessageBox::getting_diff_for`]), waiting for a short time
//! in case a possible gap resolves on its own (it is in [`MessageBox::possible_gaps`]), or on
//! its happy path.
//!
//! While there are entries whose difference must be fetched, [`MessageBox::check_deadlines`]
//! returns [`Instant::now`], since "now" is the time to get the difference.
mod adaptor;
mod defs;

use crate::{ChannelState, ChatHashCache, UpdateState};
use defs::{
    BOT_CHANNEL_DIFF_LIMIT, Combined, Entry, NO_DATE, NO_PTS, NO_SEQ, POSSIBLE_GAP_TIMEOUT,
    PossibleGap, PtsInfo, State, USER_CHANNEL_DIFF_LIMIT,
};
pub use defs::{Gap, MessageBox, PrematureEndReason, Update, UpdateAndPeers, UpdatesLike};
use grammers_tl_types as tl;
use log::{debug, info, trace, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
#[cfg(test)]
use tests::Instant;
#[cfg(not(test))]
use web_time::Instant;

fn next_updates_deadline() -> Instant {
    Instant::now() + defs::NO_UPDATES_TIMEOUT
}

fn update_sort_key(update: &Update) -> i32 {
    match PtsInfo::from_update(update) {
        Some(info) => info.pts - info.pts_count,
        None => NO_PTS,
    }
}

/// Where a batch of updates came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Socket,
    /// Part of a difference, so entries being fetched accept the updates unconditionally.
    Difference,
}

#[allow(clippy::new_without_default)]
/// Creation, querying, and setting base state.
impl MessageBox {
    /// Create a new, empty [`MessageBox`].
    pub fn new() -> Self {
        trace!("created new message box with no previous state");
        Self {
            map: BTreeMap::new(),
            date: NO_DATE,
            seq: NO_SEQ,
            possible_gaps: BTreeMap::new(),
            getting_diff_for: BTreeSet::new(),
            next_deadline: None,
        }
    }

    /// Create a [`MessageBox`] from a previously known update state.
    ///
    /// Every known entry starts out getting its difference, to catch up with whatever
    /// happened while the state was not being tracked.
    pub fn load(state: UpdateState) -> Self {
        trace!("created new message box with state: {:?}", state);
        let deadline = next_updates_deadline();
        let mut map = BTreeMap::new();

        if state.pts != NO_PTS {
            map.insert(
                Entry::AccountWide,
                State {
                    pts: state.pts,
                    deadline,
                },
            );
        }
        if state.qts != NO_PTS {
            map.insert(
                Entry::SecretChats,
                State {
                    pts: state.qts,
                    deadline,
                },
            );
        }
        map.extend(state.channels.iter().map(|channel| {
            (
                Entry::Channel(channel.channel_id),
                State {
                    pts: channel.pts,
                    deadline,
                },
            )
        }));

        Self {
            getting_diff_for: map.keys().copied().collect(),
            next_deadline: map.keys().next().copied(),
            map,
            date: state.date,
            seq: state.seq,
            possible_gaps: BTreeMap::new(),
        }
    }

    /// Return the current state in a format that sessions understand.
    ///
    /// This should be used for persisting the state.
    pub fn session_state(&self) -> UpdateState {
        UpdateState {
            pts: self.pts(Entry::AccountWide).unwrap_or(NO_PTS),
            qts: self.pts(Entry::SecretChats).unwrap_or(NO_PTS),
            date: self.date,
            seq: self.seq,
            channels: self
                .map
                .iter()
                .filter_map(|(entry, state)| match *entry {
                    Entry::Channel(channel_id) => Some(ChannelState {
                        channel_id,
                        pts: state.pts,
                    }),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Return true if the message box is empty and has no state yet.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sets the update state.
    ///
    /// Should be called right after login if [`MessageBox::new`] was used, otherwise
    /// undesirable updates will be fetched.
    pub fn set_state(&mut self, state: tl::enums::updates::State) {
        trace!("setting state {:?}", state);
        let tl::enums::updates::State::State(state) = state;
        self.set_pts(Entry::AccountWide, state.pts);
        self.set_pts(Entry::SecretChats, state.qts);
        self.date = state.date;
        self.seq = state.seq;
    }

    /// Like [`MessageBox::set_state`], but for channels. Useful when getting dialogs.
    ///
    /// The update state will only be updated if no entry was known previously.
    pub fn try_set_channel_state(&mut self, id: i64, pts: i32) {
        trace!("trying to set channel state for {}: {}", id, pts);
        if !self.map.contains_key(&Entry::Channel(id)) {
            self.set_pts(Entry::Channel(id), pts);
        }
    }

    /// Return the next deadline when receiving updates should timeout.
    ///
    /// If a deadline expired, the corresponding entries will be marked as needing to get
    /// their difference. While there are entries pending of getting their difference, this
    /// method returns the current instant.
    pub fn check_deadlines(&mut self) -> Instant {
        let now = Instant::now();

        if !self.getting_diff_for.is_empty() {
            return now;
        }

        let deadline = self
            .possible_gaps
            .values()
            .map(|gap| gap.deadline)
            .fold(self.closest_entry_deadline(), |a, b| a.min(b));

        if now < deadline {
            return deadline;
        }

        let expired = self
            .map
            .iter()
            .filter(|(entry, state)| {
                now >= state.deadline
                    || self
                        .possible_gaps
                        .get(entry)
                        .is_some_and(|gap| now >= gap.deadline)
            })
            .map(|(entry, _)| *entry)
            .collect::<Vec<_>>();

        for entry in expired {
            debug!("deadline for forcibly fetching updates met for {:?}", entry);
            self.begin_get_diff(entry);
        }

        if self.getting_diff_for.is_empty() {
            next_updates_deadline()
        } else {
            now
        }
    }

    fn pts(&self, entry: Entry) -> Option<i32> {
        self.map.get(&entry).map(|state| state.pts)
    }

    fn closest_entry_deadline(&self) -> Instant {
        self.next_deadline
            .and_then(|entry| self.map.get(&entry))
            .map(|state| state.deadline)
            .unwrap_or_else(next_updates_deadline)
    }

    fn set_pts(&mut self, entry: Entry, pts: i32) {
        match self.map.get_mut(&entry) {
            Some(state) => state.pts = pts,
            None => {
                self.map.insert(
                    entry,
                    State {
                        pts,
                        deadline: next_updates_deadline(),
                    },
                );
                // Any existing deadline is at least as close as a brand new one.
                if self.next_deadline.is_none() {
                    self.next_deadline = Some(entry);
                }
            }
        }
    }

    fn pop_entry(&mut self, entry: Entry) {
        self.possible_gaps.remove(&entry);
        self.getting_diff_for.remove(&entry);
        if self.map.remove(&entry).is_some() && self.next_deadline == Some(entry) {
            self.recompute_next_deadline();
        }
    }

    /// Reset the deadline of an existing entry. Does nothing if the entry doesn't exist.
    fn reset_deadline(&mut self, entry: Entry, deadline: Instant) {
        let Some(state) = self.map.get_mut(&entry) else {
            return;
        };
        state.deadline = deadline;

        let next = self
            .next_deadline
            .and_then(|next| self.map.get(&next).map(|state| (next, state.deadline)));
        match next {
            // The deadline moved, so it may no longer be the closest one.
            Some((next, _)) if next == entry => self.recompute_next_deadline(),
            Some((_, next_deadline)) if next_deadline <= deadline => {}
            _ => self.next_deadline = Some(entry),
        }
    }

    fn reset_timeout(&mut self, entry: Entry, timeout: Option<i32>) {
        self.reset_deadline(
            entry,
            timeout
                .map(|t| Instant::now() + Duration::from_secs(t.max(0) as u64))
                .unwrap_or_else(next_updates_deadline),
        );
    }

    fn recompute_next_deadline(&mut self) {
        self.next_deadline = self
            .map
            .iter()
            .min_by_key(|(_, state)| state.deadline)
            .map(|(entry, _)| *entry);
    }

    /// Begin getting difference for the given entry, clearing any previous gap.
    ///
    /// Does nothing if the entry has no previously-known state to get the difference from.
    fn begin_get_diff(&mut self, entry: Entry) {
        if self.map.contains_key(&entry) {
            self.possible_gaps.remove(&entry);
            self.getting_diff_for.insert(entry);
        }
    }

    /// Finish getting difference for the given entry, and reset its deadline.
    fn end_get_diff(&mut self, entry: Entry) {
        if self.getting_diff_for.remove(&entry) {
            self.reset_deadline(entry, next_updates_deadline());
        }
        debug_assert!(
            !self.possible_gaps.contains_key(&entry),
            "gaps shouldn't be created while getting difference"
        );
    }
}

// "Normal" updates flow (processing and detection of gaps).
impl MessageBox {
    /// Process an update and return what should be done with it.
    ///
    /// Updates for entries whose difference is being fetched are ignored. According to the
    /// [updates' documentation]:
    ///
    /// > Implementations \[have\] to postpone updates received via the socket while
    /// > filling gaps in the event and `Update` sequences, as well as avoid filling
    /// > gaps in the same sequence.
    ///
    /// Those updates will be retrieved through getting difference anyway.
    ///
    /// The chats mentioned by the updates are remembered in `chat_hashes`.
    ///
    /// [updates' documentation]: https://core.telegram.org/api/updates
    pub fn process_updates(
        &mut self,
        updates: UpdatesLike,
        chat_hashes: &mut ChatHashCache,
    ) -> Result<UpdateAndPeers, Gap> {
        trace!("processing updates: {:?}", updates);

        let Combined {
            date,
            seq_start,
            seq,
            updates,
            users,
            chats,
        } = match adaptor::adapt(updates) {
            Ok(combined) => combined,
            Err(Gap) => {
                self.begin_get_diff(Entry::AccountWide);
                return Err(Gap);
            }
        };
        chat_hashes.extend(&chats);

        // > For all the other [not `updates` or `updatesCombined`] `Updates` type constructors
        // > there is no need to check `seq` or change a local state.
        if seq_start != NO_SEQ {
            match (self.seq + 1).cmp(&seq_start) {
                Ordering::Equal => {}
                Ordering::Greater => {
                    debug!(
                        "skipping updates that were already handled at seq = {}",
                        self.seq
                    );
                    return Ok((Vec::new(), users, chats));
                }
                Ordering::Less => {
                    info!(
                        "gap detected (local seq {}, remote seq {})",
                        self.seq, seq_start
                    );
                    self.begin_get_diff(Entry::AccountWide);
                    return Err(Gap);
                }
            }
        }

        let result = self.apply_updates(updates, Origin::Socket);

        if !result.is_empty() && self.possible_gaps.is_empty() {
            // > If the updates were applied, local *Updates* state must be updated
            // > with `seq` (unless it's 0) and `date` from the constructor.
            if date != NO_DATE {
                self.date = date;
            }
            if seq != NO_SEQ {
                self.seq = seq;
            }
        }

        Ok((result, users, chats))
    }

    /// Apply every update in order, returning the ones ready to be handled.
    ///
    /// Previous possible gaps are retried afterwards, since the new updates may have filled them.
    fn apply_updates(
        &mut self,
        mut updates: Vec<Update>,
        origin: Origin,
    ) -> Vec<Update> {
        // Telegram can send updates out of order (e.g. `ReadChannelInbox` first
        // and then `NewChannelMessage`, both with the same `pts`, but the `count`
        // is `0` and `1` respectively), so we sort them first.
        updates.sort_by_key(update_sort_key);

        let had_gaps = !self.possible_gaps.is_empty();
        let mut result = Vec::with_capacity(updates.len());
        result.extend(
            updates
                .into_iter()
                .filter_map(|update| self.apply_pts_info(update, origin)),
        );

        if had_gaps {
            let entries = self.possible_gaps.keys().copied().collect::<Vec<_>>();
            for entry in entries {
                let Some(mut gap) = self.possible_gaps.remove(&entry) else {
                    continue;
                };
                gap.updates.sort_by_key(update_sort_key);
                for update in gap.updates {
                    result.extend(self.apply_pts_info(update, Origin::Socket));
                }

                match self.possible_gaps.get_mut(&entry) {
                    // Re-inserted updates keep waiting until the original deadline.
                    Some(remaining) => remaining.deadline = gap.deadline,
                    None => debug!("successfully resolved gap for {:?} by waiting", entry),
                }
            }
        }

        result
    }

    /// Tries to apply the input update if its `PtsInfo` follows the correct order.
    ///
    /// If the update can be applied, it is returned; otherwise, the update is stored in a
    /// possible gap (unless it was already handled or would be handled through getting
    /// difference) and `None` is returned.
    fn apply_pts_info(&mut self, update: Update, origin: Origin) -> Option<Update> {
        if let Update::Raw(tl::enums::Update::ChannelTooLong(u)) = &update {
            let entry = Entry::Channel(u.channel_id);
            if let Some(pts) = u.pts.filter(|_| !self.map.contains_key(&entry)) {
                self.set_pts(entry, pts);
            }
            info!("channel {} is too long, getting its difference", u.channel_id);
            self.begin_get_diff(entry);
            return None;
        }

        // No pts means that the update can be applied in any order.
        let Some(info) = PtsInfo::from_update(&update) else {
            return Some(update);
        };

        if self.getting_diff_for.contains(&info.entry) {
            return match origin {
                Origin::Socket => {
                    debug!(
                        "skipping update for {:?} (getting difference, count {:?}, remote {:?})",
                        info.entry, info.pts_count, info.pts
                    );
                    None
                }
                Origin::Difference => Some(update),
            };
        }

        let Some(local_pts) = self.pts(info.entry) else {
            // With no previous state, this update has to be "right". An update with no count
            // may share its `pts` with the one that comes after it, so that one is let through.
            let pts = if info.pts_count == 0 {
                info.pts - 1
            } else {
                info.pts
            };
            self.set_pts(info.entry, pts.max(1));
            return Some(update);
        };

        match (local_pts + info.pts_count).cmp(&info.pts) {
            Ordering::Equal => {
                self.set_pts(info.entry, info.pts);
                self.reset_deadline(info.entry, next_updates_deadline());
                Some(update)
            }
            Ordering::Greater => {
                debug!(
                    "skipping update for {:?} (local {:?}, count {:?}, remote {:?})",
                    info.entry, local_pts, info.pts_count, info.pts
                );
                None
            }
            Ordering::Less => {
                info!(
                    "gap on update for {:?} (local {:?}, count {:?}, remote {:?})",
                    info.entry, local_pts, info.pts_count, info.pts
                );
                let deadline = Instant::now() + POSSIBLE_GAP_TIMEOUT;
                self.possible_gaps
                    .entry(info.entry)
                    .or_insert_with(|| PossibleGap {
                        deadline,
                        updates: Vec::new(),
                    })
                    .updates
                    .push(update);
                None
            }
        }
    }
}

/// Getting and applying account difference.
impl MessageBox {
    /// Return the request that needs to be made to get the difference, if any.
    pub fn get_difference(&self) -> Option<tl::functions::updates::GetDifference> {
        if !self.getting_diff_for.contains(&Entry::AccountWide)
            && !self.getting_diff_for.contains(&Entry::SecretChats)
        {
            return None;
        }

        let gd = tl::functions::updates::GetDifference {
            pts: self.pts(Entry::AccountWide).unwrap_or(NO_PTS),
            pts_limit: None,
            pts_total_limit: None,
            date: self.date.max(1), // non-zero or the request will fail
            qts: self.pts(Entry::SecretChats).unwrap_or(NO_PTS),
            qts_limit: None,
        };
        trace!("requesting {:?}", gd);
        Some(gd)
    }

    /// Similar to [`MessageBox::process_updates`], but using the result from getting difference.
    pub fn apply_difference(
        &mut self,
        difference: tl::enums::updates::Difference,
        chat_hashes: &mut ChatHashCache,
    ) -> UpdateAndPeers {
        trace!("applying account difference: {:?}", difference);
        let finish: bool;
        let result = match difference {
            tl::enums::updates::Difference::Empty(diff) => {
                debug!(
                    "handling empty difference (date = {}, seq = {}); no longer getting diff",
                    diff.date, diff.seq
                );
                finish = true;
                self.date = diff.date;
                self.seq = diff.seq;
                (Vec::new(), Vec::new(), Vec::new())
            }
            tl::enums::updates::Difference::Difference(diff) => {
                debug!(
                    "handling full difference {:?}; no longer getting diff",
                    diff.state
                );
                finish = true;
                self.apply_difference_type(diff, chat_hashes)
            }
            tl::enums::updates::Difference::Slice(tl::types::updates::DifferenceSlice {
                new_messages,
                new_encrypted_messages,
                other_updates,
                chats,
                users,
                intermediate_state: state,
            }) => {
                debug!("handling partial difference {:?}", state);
                finish = false;
                self.apply_difference_type(
                    tl::types::updates::Difference {
                        new_messages,
                        new_encrypted_messages,
                        other_updates,
                        chats,
                        users,
                        state,
                    },
                    chat_hashes,
                )
            }
            tl::enums::updates::Difference::TooLong(diff) => {
                // Whatever happened before this `pts` is lost for good.
                warn!(
                    "handling too-long difference (pts = {}); no longer getting diff",
                    diff.pts
                );
                finish = true;
                self.set_pts(Entry::AccountWide, diff.pts);
                (Vec::new(), Vec::new(), Vec::new())
            }
        };

        if finish {
            self.end_get_diff(Entry::AccountWide);
            self.end_get_diff(Entry::SecretChats);
        }

        result
    }

    fn apply_difference_type(
        &mut self,
        tl::types::updates::Difference {
            new_messages,
            new_encrypted_messages,
            other_updates,
            chats,
            users,
            state: tl::enums::updates::State::State(state),
        }: tl::types::updates::Difference,
        chat_hashes: &mut ChatHashCache,
    ) -> UpdateAndPeers {
        self.date = state.date;
        self.seq = state.seq;
        if state.pts != NO_PTS {
            self.set_pts(Entry::AccountWide, state.pts);
        }
        if state.qts != NO_PTS {
            self.set_pts(Entry::SecretChats, state.qts);
        }
        chat_hashes.extend(&chats);

        // `other_updates` can contain things like `updateChannelTooLong` and
        // `updateNewChannelMessage`, which go through the same checks as socket updates.
        let mut updates = self.apply_updates(raw(other_updates), Origin::Difference);

        updates.extend(
            new_messages
                .into_iter()
                .map(|message| {
                    tl::enums::Update::NewMessage(tl::types::UpdateNewMessage {
                        message,
                        pts: NO_PTS,
                        pts_count: 0,
                    })
                })
                .chain(new_encrypted_messages.into_iter().map(|message| {
                    tl::enums::Update::NewEncryptedMessage(tl::types::UpdateNewEncryptedMessage {
                        message,
                        qts: NO_PTS,
                    })
                }))
                .map(Update::Raw),
        );

        (updates, users, chats)
    }
}

/// Getting and applying channel difference.
impl MessageBox {
    /// Return the request that needs to be made to get a channel's difference, if any.
    ///
    /// Channels whose access hash is not in `chat_hashes` cannot be fetched. Their state is
    /// dropped, and the updates they missed are lost.
    pub fn get_channel_difference(
        &mut self,
        chat_hashes: &ChatHashCache,
    ) -> Option<tl::functions::updates::GetChannelDifference> {
        loop {
            let (entry, channel_id) = self.getting_diff_for.iter().find_map(|&entry| match entry {
                Entry::Channel(id) => Some((entry, id)),
                _ => None,
            })?;

            let Some(pts) = self.pts(entry) else {
                self.getting_diff_for.remove(&entry);
                continue;
            };

            match chat_hashes.get_input_channel(channel_id) {
                Some(channel) => {
                    let gd = tl::functions::updates::GetChannelDifference {
                        force: false,
                        channel,
                        filter: tl::enums::ChannelMessagesFilter::Empty,
                        pts,
                        limit: if chat_hashes.is_self_bot() {
                            BOT_CHANNEL_DIFF_LIMIT
                        } else {
                            USER_CHANNEL_DIFF_LIMIT
                        },
                    };
                    trace!("requesting {:?}", gd);
                    return Some(gd);
                }
                None => {
                    warn!(
                        "cannot get difference for channel {} without its access hash; forgetting it",
                        channel_id
                    );
                    self.pop_entry(entry);
                }
            }
        }
    }

    /// Similar to [`MessageBox::process_updates`], but using the result from getting the
    /// difference requested by `request`.
    pub fn apply_channel_difference(
        &mut self,
        request: &tl::functions::updates::GetChannelDifference,
        difference: tl::enums::updates::ChannelDifference,
        chat_hashes: &mut ChatHashCache,
    ) -> UpdateAndPeers {
        let Some(channel_id) = requested_channel(request) else {
            return (Vec::new(), Vec::new(), Vec::new());
        };
        let entry = Entry::Channel(channel_id);
        trace!(
            "applying channel difference for {}: {:?}",
            channel_id, difference
        );
        self.possible_gaps.remove(&entry);

        let (r#final, timeout, result) = match difference {
            tl::enums::updates::ChannelDifference::Empty(diff) => {
                self.set_pts(entry, diff.pts);
                (diff.r#final, diff.timeout, (Vec::new(), Vec::new(), Vec::new()))
            }
            tl::enums::updates::ChannelDifference::TooLong(
                tl::types::updates::ChannelDifferenceTooLong {
                    r#final,
                    timeout,
                    dialog,
                    messages,
                    chats,
                    users,
                },
            ) => {
                warn!("handling too-long difference for channel {}", channel_id);
                let result = self.apply_truncated_channel_history(
                    entry,
                    dialog_pts(&dialog),
                    (channel_messages(messages), users, chats),
                    chat_hashes,
                );
                (r#final, timeout, result)
            }
            tl::enums::updates::ChannelDifference::Difference(
                tl::types::updates::ChannelDifference {
                    r#final,
                    pts,
                    timeout,
                    new_messages,
                    other_updates,
                    chats,
                    users,
                },
            ) => {
                self.set_pts(entry, pts);
                chat_hashes.extend(&chats);
                let mut updates = self.apply_updates(raw(other_updates), Origin::Difference);
                updates.extend(channel_messages(new_messages));
                (r#final, timeout, (updates, users, chats))
            }
        };

        if r#final {
            debug!(
                "handling channel {} difference; no longer getting diff",
                channel_id
            );
            self.end_get_diff(entry);
        } else {
            debug!("handling channel {} difference", channel_id);
        }
        self.reset_timeout(entry, timeout);

        result
    }

    /// The history was truncated, so only the latest messages are known, and the
    /// dialog's `pts` (if any) is the new starting point.
    fn apply_truncated_channel_history(
        &mut self,
        entry: Entry,
        pts: Option<i32>,
        result: UpdateAndPeers,
        chat_hashes: &mut ChatHashCache,
    ) -> UpdateAndPeers {
        if let Some(pts) = pts {
            self.set_pts(entry, pts);
        }
        chat_hashes.extend(&result.2);
        result
    }

    /// Stop getting the difference requested by `request` before it was complete.
    pub fn end_channel_difference(
        &mut self,
        request: &tl::functions::updates::GetChannelDifference,
        reason: PrematureEndReason,
    ) {
        let Some(channel_id) = requested_channel(request) else {
            return;
        };
        let entry = Entry::Channel(channel_id);
        trace!(
            "ending channel difference for {} because {:?}",
            channel_id, reason
        );
        match reason {
            PrematureEndReason::TemporaryServerIssues => {
                self.possible_gaps.remove(&entry);
                self.end_get_diff(entry);
            }
            PrematureEndReason::Banned => {
                self.pop_entry(entry);
            }
        }
    }
}

fn requested_channel(request: &tl::functions::updates::GetChannelDifference) -> Option<i64> {
    match &request.channel {
        tl::enums::InputChannel::Channel(channel) => Some(channel.channel_id),
        tl::enums::InputChannel::FromMessage(channel) => Some(channel.channel_id),
        tl::enums::InputChannel::Empty => None,
    }
}

fn dialog_pts(dialog: &tl::enums::Dialog) -> Option<i32> {
    match dialog {
        tl::enums::Dialog::Dialog(dialog) => dialog.pts,
        tl::enums::Dialog::Folder(_) => None,
    }
}

fn raw(updates: Vec<tl::enums::Update>) -> Vec<Update> {
    updates.into_iter().map(Update::Raw).collect()
}

fn channel_messages(messages: Vec<tl::enums::Message>) -> Vec<Update> {
    messages
        .into_iter()
        .map(|message| {
            Update::Raw(tl::enums::Update::NewChannelMessage(
                tl::types::UpdateNewChannelMessage {
                    message,
                    pts: NO_PTS,
                    pts_count: 0,
                },
            ))
        })
        .collect()
}
