// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use grammers_tl_types as tl;
use std::collections::HashMap;

/// In-memory cache mapping channels to the access hash needed to refer to them.
///
/// Channel differences cannot be requested without the hash, so it is filled with
/// every chat seen while processing updates or differences.
#[derive(Clone, Debug, Default)]
pub struct ChatHashCache {
    channels: HashMap<i64, i64>,
    self_id: Option<i64>,
    self_bot: bool,
}

impl ChatHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember who the logged-in account is.
    pub fn set_self(&mut self, user_id: i64, bot: bool) {
        self.self_id = Some(user_id);
        self.self_bot = bot;
    }

    pub fn self_id(&self) -> Option<i64> {
        self.self_id
    }

    pub fn is_self_bot(&self) -> bool {
        self.self_bot
    }

    /// Store the access hash of a channel known from elsewhere, such as the dialog list.
    pub fn insert_channel(&mut self, channel_id: i64, access_hash: i64) {
        self.channels.insert(channel_id, access_hash);
    }

    pub fn contains_channel(&self, channel_id: i64) -> bool {
        self.channels.contains_key(&channel_id)
    }

    /// Remember the access hashes carried by the given chats.
    pub fn extend(&mut self, chats: &[tl::enums::Chat]) {
        for chat in chats {
            match chat {
                // See https://core.telegram.org/api/min. Min constructors carry a hash
                // that only works in the context they were sent in.
                tl::enums::Chat::Channel(channel) => {
                    if let (false, Some(access_hash)) = (channel.min, channel.access_hash) {
                        self.insert_channel(channel.id, access_hash);
                    }
                }
                tl::enums::Chat::ChannelForbidden(channel) => {
                    self.insert_channel(channel.id, channel.access_hash);
                }
                // Small group chats are referred to by id alone.
                tl::enums::Chat::Empty(_)
                | tl::enums::Chat::Chat(_)
                | tl::enums::Chat::Forbidden(_) => {}
            }
        }
    }

    pub fn get_input_channel(&self, channel_id: i64) -> Option<tl::enums::InputChannel> {
        self.channels.get(&channel_id).map(|&access_hash| {
            tl::enums::InputChannel::Channel(tl::types::InputChannel {
                channel_id,
                access_hash,
            })
        })
    }
}
