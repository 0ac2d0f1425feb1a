// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::Instant;
use grammers_tl_types as tl;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Telegram sends `seq` equal to `0` when "it doesn't matter", so we use that value too.
pub(super) const NO_SEQ: i32 = 0;

/// Telegram may send updates with a `qts` of `0` interleaved with non-zero ones (for example,
/// `updateBotStopped`). Such updates carry no ordering information and are applied as they come.
pub(super) const NO_PTS: i32 = 0;

/// Updates pushed through `updateShort` have a date, but those built locally (such as the
/// messages coming from getting difference) do not, and use this instead.
pub(super) const NO_DATE: i32 = 0;

// See https://core.telegram.org/method/updates.getChannelDifference.
pub(super) const BOT_CHANNEL_DIFF_LIMIT: i32 = 100000;
pub(super) const USER_CHANNEL_DIFF_LIMIT: i32 = 100;

// > It may be useful to wait up to 0.5 seconds
pub(super) const POSSIBLE_GAP_TIMEOUT: Duration = Duration::from_millis(500);

/// After how long without updates an entry is considered stale.
///
/// Stale entries are refreshed by getting difference, which ignores the updates that arrive
/// in the meantime. Documentation recommends 15 minutes (https://core.telegram.org/api/updates).
pub(super) const NO_UPDATES_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// An independent update stream, with its own persistent timestamp.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Entry {
    /// Account-wide `pts`, used by private conversations and small group chats.
    AccountWide,
    /// Account-wide `qts`, used by secret chats and some bot updates.
    SecretChats,
    /// Channel-specific `pts`, used by broadcast channels and supergroups.
    Channel(i64),
}

/// Keeps every update stream ordered and knows when the difference needs to be fetched.
///
/// See <https://core.telegram.org/api/updates#message-related-event-sequences>.
#[derive(Debug)]
pub struct MessageBox {
    /// Current state of every known entry, in order.
    pub(super) map: BTreeMap<Entry, State>,

    // Additional fields beyond `pts` needed by `Entry::AccountWide`.
    pub(super) date: i32,
    pub(super) seq: i32,

    /// Entries holding back updates because the ones preceding them have not arrived yet.
    pub(super) possible_gaps: BTreeMap<Entry, PossibleGap>,

    /// Entries whose difference is being fetched. Socket updates for them are ignored.
    pub(super) getting_diff_for: BTreeSet<Entry>,

    /// The entry with the closest deadline.
    pub(super) next_deadline: Option<Entry>,
}

/// Where to find the `pts` of an update and how much it advances its entry.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct PtsInfo {
    pub(super) pts: i32,
    pub(super) pts_count: i32,
    pub(super) entry: Entry,
}

#[derive(Debug)]
pub(super) struct State {
    /// Local persistent timestamp. Never decreases while the entry is alive.
    pub(super) pts: i32,

    /// When to get the difference if no updates for this entry arrive before then.
    pub(super) deadline: Instant,
}

// > ### Recovering gaps
// > […] Manually obtaining updates is also required in the following situations:
// > • Loss of sync: a gap was found in `seq` / `pts` / `qts` (as described above).
// >   It may be useful to wait up to 0.5 seconds in this situation and abort the sync in case a new update
// >   arrives, that fills the gap.
#[derive(Debug)]
pub(super) struct PossibleGap {
    pub(super) deadline: Instant,
    /// Updates ahead of the local `pts`, applied once the missing ones show up.
    pub(super) updates: Vec<Update>,
}

/// Updates were lost. The difference has to be fetched before continuing.
#[derive(Debug, PartialEq, Eq)]
pub struct Gap;

/// Anything the server sends that can affect the update state.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdatesLike {
    Updates(tl::enums::Updates),
    /// The connection was lost, so anything sent in the meantime was missed.
    ConnectionClosed,
}

impl From<tl::enums::Updates> for UpdatesLike {
    fn from(updates: tl::enums::Updates) -> Self {
        Self::Updates(updates)
    }
}

/// Why a channel difference could not be fetched to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrematureEndReason {
    /// The server failed to answer. The last known `pts` is kept and fetching is retried later.
    TemporaryServerIssues,
    /// The account can no longer access the channel. Its state is forgotten.
    Banned,
}

/// A single update, ready to be handled.
///
/// The short constructors of `Updates` lack most of the fields of a full message,
/// so they are passed along as they arrived instead of being rebuilt into one.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    Raw(tl::enums::Update),
    /// A private message, sent by `user_id` or to them if `out` is set.
    ShortMessage(tl::types::UpdateShortMessage),
    ShortChatMessage(tl::types::UpdateShortChatMessage),
    /// Confirmation of a message sent by this account. The message itself is not included.
    ShortSentMessage(tl::types::UpdateShortSentMessage),
}

impl From<tl::enums::Update> for Update {
    fn from(update: tl::enums::Update) -> Self {
        Self::Raw(update)
    }
}

/// Every shape of `Updates`, flattened into the fields the message box cares about.
#[derive(Debug)]
pub(super) struct Combined {
    pub(super) updates: Vec<Update>,
    pub(super) users: Vec<tl::enums::User>,
    pub(super) chats: Vec<tl::enums::Chat>,
    pub(super) date: i32,
    pub(super) seq_start: i32,
    pub(super) seq: i32,
}

/// The updates ready to be handled, along with the users and chats they mention.
pub type UpdateAndPeers = (Vec<Update>, Vec<tl::enums::User>, Vec<tl::enums::Chat>);
