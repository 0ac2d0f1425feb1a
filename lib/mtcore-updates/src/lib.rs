// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Update gap detection and recovery.
//!
//! Telegram pushes updates over a channel with no ordering guarantees, and drops them
//! whenever the connection goes away. The [`MessageBox`] reconstructs the order of every
//! independent update stream and tells the caller when (and how) the missing updates
//! have to be fetched by "getting difference".
//!
//! The state needed to resume where a previous run left off is an [`UpdateState`].
#![deny(unsafe_code)]

mod chat_hash_cache;
mod message_box;

pub use chat_hash_cache::ChatHashCache;
pub use message_box::{
    Gap, MessageBox, PrematureEndReason, Update, UpdateAndPeers, UpdatesLike,
};

/// The persisted state of a single channel's update stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub channel_id: i64,
    pub pts: i32,
}

/// Everything that needs to be persisted to resume receiving updates without losing any.
///
/// A value of `0` in any of the account-wide fields means it is not known.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateState {
    /// Account-wide persistent timestamp.
    pub pts: i32,
    /// Persistent timestamp of the secret chats and a few other bot-specific updates.
    pub qts: i32,
    pub date: i32,
    pub seq: i32,
    /// Per-channel persistent timestamps, sorted by channel.
    pub channels: Vec<ChannelState>,
}
