// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use super::defs::{Combined, Entry, Gap, NO_PTS, NO_SEQ, PtsInfo, Update, UpdatesLike};
use grammers_tl_types::{self as tl, Deserializable};
use log::{info, warn};

// > The `updateShortMessage`, `updateShortSentMessage` and `updateShortChatMessage` constructors
// > [...] should be transformed to `updateShort` upon receiving.
//
// Every shape is flattened into a `Combined`, which holds all of the fields the message box
// needs. The short messages stay as they are inside of it (see `Update`).

impl UpdatesLike {
    /// Decode updates pushed by the server.
    ///
    /// Bytes that fail to decode are treated as `updatesTooLong`, so whatever they carried
    /// is recovered by getting difference.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match tl::enums::Updates::from_bytes(bytes) {
            Ok(updates) => Self::Updates(updates),
            Err(e) => {
                warn!("telegram sent updates that failed to be deserialized: {e}");
                Self::Updates(tl::enums::Updates::TooLong)
            }
        }
    }
}

fn single(update: Update, date: i32) -> Combined {
    Combined {
        updates: vec![update],
        users: Vec::new(),
        chats: Vec::new(),
        date,
        seq_start: NO_SEQ,
        seq: NO_SEQ,
    }
}

pub(super) fn adapt(updates: UpdatesLike) -> Result<Combined, Gap> {
    let updates = match updates {
        UpdatesLike::Updates(updates) => updates,
        UpdatesLike::ConnectionClosed => {
            info!("connection was closed, treating as gap");
            return Err(Gap);
        }
    };

    Ok(match updates {
        // > `updatesTooLong` indicates that there are too many events pending to be pushed
        // > to the client, so one needs to fetch them manually.
        tl::enums::Updates::TooLong => {
            info!("received updatesTooLong, treating as gap");
            return Err(Gap);
        }
        tl::enums::Updates::UpdateShortMessage(short) => {
            let date = short.date;
            single(Update::ShortMessage(short), date)
        }
        tl::enums::Updates::UpdateShortChatMessage(short) => {
            let date = short.date;
            single(Update::ShortChatMessage(short), date)
        }
        // > `updateShort` […] have lower priority and are broadcast to a large number of users.
        tl::enums::Updates::UpdateShort(short) => single(Update::Raw(short.update), short.date),
        // > [the] `seq` attribute, which indicates the remote `Updates` state after the
        // > generation of the `Updates`, and `seq_start` indicates the remote `Updates` state
        // > after the first of the `Updates` in the packet is generated
        tl::enums::Updates::Combined(combined) => Combined {
            updates: combined.updates.into_iter().map(Update::Raw).collect(),
            users: combined.users,
            chats: combined.chats,
            date: combined.date,
            seq_start: combined.seq_start,
            seq: combined.seq,
        },
        // > [the] `seq_start` attribute is omitted, because it is assumed that it is always
        // > equal to `seq`.
        tl::enums::Updates::Updates(updates) => Combined {
            updates: updates.updates.into_iter().map(Update::Raw).collect(),
            users: updates.users,
            chats: updates.chats,
            date: updates.date,
            seq_start: updates.seq,
            seq: updates.seq,
        },
        // The text is missing, but the `pts` it carries must still be applied.
        tl::enums::Updates::UpdateShortSentMessage(short) => {
            let date = short.date;
            single(Update::ShortSentMessage(short), date)
        }
    })
}

fn peer_channel_id(peer: &tl::enums::Peer) -> Option<i64> {
    match peer {
        tl::enums::Peer::Channel(c) => Some(c.channel_id),
        tl::enums::Peer::User(_) | tl::enums::Peer::Chat(_) => None,
    }
}

fn message_channel_id(message: &tl::enums::Message) -> Option<i64> {
    match message {
        tl::enums::Message::Empty(m) => m.peer_id.as_ref().and_then(peer_channel_id),
        tl::enums::Message::Message(m) => peer_channel_id(&m.peer_id),
        tl::enums::Message::Service(m) => peer_channel_id(&m.peer_id),
    }
}

fn account_wide(pts: i32, pts_count: i32) -> Option<PtsInfo> {
    Some(PtsInfo {
        pts,
        pts_count,
        entry: Entry::AccountWide,
    })
}

fn channel(channel_id: i64, pts: i32, pts_count: i32) -> Option<PtsInfo> {
    Some(PtsInfo {
        pts,
        pts_count,
        entry: Entry::Channel(channel_id),
    })
}

fn secret_chats(qts: i32, pts_count: i32) -> Option<PtsInfo> {
    Some(PtsInfo {
        pts: qts,
        pts_count,
        entry: Entry::SecretChats,
    })
}

impl PtsInfo {
    /// Which entry the update belongs to, or `None` if it can be applied in any order.
    pub(super) fn from_update(update: &Update) -> Option<Self> {
        let info = match update {
            Update::Raw(update) => Self::from_raw(update),
            Update::ShortMessage(u) => account_wide(u.pts, u.pts_count),
            Update::ShortChatMessage(u) => account_wide(u.pts, u.pts_count),
            Update::ShortSentMessage(u) => account_wide(u.pts, u.pts_count),
        };
        info.filter(|info| info.pts != NO_PTS)
    }

    fn from_raw(update: &tl::enums::Update) -> Option<Self> {
        use tl::enums::Update::*;
        match update {
            NewMessage(u) => account_wide(u.pts, u.pts_count),
            DeleteMessages(u) => account_wide(u.pts, u.pts_count),
            ReadHistoryInbox(u) => account_wide(u.pts, u.pts_count),
            ReadHistoryOutbox(u) => account_wide(u.pts, u.pts_count),
            WebPage(u) => account_wide(u.pts, u.pts_count),
            ReadMessagesContents(u) => account_wide(u.pts, u.pts_count),
            EditMessage(u) => account_wide(u.pts, u.pts_count),
            FolderPeers(u) => account_wide(u.pts, u.pts_count),
            PinnedMessages(u) => account_wide(u.pts, u.pts_count),
            // Telegram actually sends `updateNewChannelMessage(messageEmpty(…))`, and when
            // there's no way to tell which channel this `pts` belongs to, the best we can do
            // is ignore it. Future messages will reveal the gap.
            NewChannelMessage(u) => message_channel_id(&u.message)
                .and_then(|channel_id| channel(channel_id, u.pts, u.pts_count)),
            EditChannelMessage(u) => message_channel_id(&u.message)
                .and_then(|channel_id| channel(channel_id, u.pts, u.pts_count)),
            DeleteChannelMessages(u) => channel(u.channel_id, u.pts, u.pts_count),
            ReadChannelInbox(u) => channel(u.channel_id, u.pts, 0),
            ChannelWebPage(u) => channel(u.channel_id, u.pts, u.pts_count),
            PinnedChannelMessages(u) => channel(u.channel_id, u.pts, u.pts_count),
            ChannelTooLong(u) => u.pts.and_then(|pts| channel(u.channel_id, pts, 0)),
            NewEncryptedMessage(u) => secret_chats(u.qts, 1),
            ChatParticipant(u) => secret_chats(u.qts, 0),
            ChannelParticipant(u) => secret_chats(u.qts, 0),
            BotStopped(u) => secret_chats(u.qts, 0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammers_tl_types::Serializable;

    fn channel_message(peer_id: Option<tl::enums::Peer>) -> Update {
        tl::enums::Update::NewChannelMessage(tl::types::UpdateNewChannelMessage {
            message: tl::types::MessageEmpty { id: 1, peer_id }.into(),
            pts: 10,
            pts_count: 1,
        })
        .into()
    }

    // updateShortMessage with no flags set: id, user_id, message, pts, pts_count, date.
    fn short_message_bytes(pts: i32, pts_count: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(0x313bc7f8u32.to_le_bytes());
        bytes.extend(0i32.to_le_bytes());
        bytes.extend(55i32.to_le_bytes());
        bytes.extend(1234i64.to_le_bytes());
        bytes.extend([2, b'h', b'i', 0]);
        bytes.extend(pts.to_le_bytes());
        bytes.extend(pts_count.to_le_bytes());
        bytes.extend(1_700_000_000i32.to_le_bytes());
        bytes
    }

    // updateShortSentMessage with no flags set: id, pts, pts_count, date.
    fn short_sent_message_bytes(pts: i32, pts_count: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(0x9015e101u32.to_le_bytes());
        bytes.extend(0i32.to_le_bytes());
        bytes.extend(56i32.to_le_bytes());
        bytes.extend(pts.to_le_bytes());
        bytes.extend(pts_count.to_le_bytes());
        bytes.extend(1_700_000_001i32.to_le_bytes());
        bytes
    }

    #[test]
    fn undecodable_updates_are_too_long() {
        assert_eq!(
            UpdatesLike::from_bytes(&[0xde, 0xad, 0xbe, 0xef]),
            UpdatesLike::Updates(tl::enums::Updates::TooLong)
        );
        assert_eq!(
            UpdatesLike::from_bytes(&[]),
            UpdatesLike::Updates(tl::enums::Updates::TooLong)
        );
    }

    #[test]
    fn decodable_updates_are_kept() {
        let updates = tl::enums::Updates::UpdateShort(tl::types::UpdateShort {
            update: tl::enums::Update::LoginToken,
            date: 7,
        });
        assert_eq!(
            UpdatesLike::from_bytes(&updates.to_bytes()),
            UpdatesLike::Updates(updates)
        );
    }

    #[test]
    fn short_messages_are_not_gaps() {
        let updates = UpdatesLike::from_bytes(&short_message_bytes(21, 1));
        let combined = adapt(updates).unwrap();

        assert_eq!(combined.date, 1_700_000_000);
        assert_eq!((combined.seq_start, combined.seq), (NO_SEQ, NO_SEQ));
        match &combined.updates[..] {
            [Update::ShortMessage(short)] => {
                assert_eq!(short.user_id, 1234);
                assert_eq!(short.message, "hi");
            }
            other => panic!("unexpected updates: {other:?}"),
        }
        assert_eq!(
            PtsInfo::from_update(&combined.updates[0]),
            Some(PtsInfo {
                pts: 21,
                pts_count: 1,
                entry: Entry::AccountWide,
            })
        );
    }

    #[test]
    fn short_sent_messages_advance_account_pts() {
        let combined = adapt(UpdatesLike::from_bytes(&short_sent_message_bytes(30, 2))).unwrap();
        assert!(matches!(
            &combined.updates[..],
            [Update::ShortSentMessage(short)] if short.id == 56
        ));
        assert_eq!(
            PtsInfo::from_update(&combined.updates[0]),
            Some(PtsInfo {
                pts: 30,
                pts_count: 2,
                entry: Entry::AccountWide,
            })
        );
    }

    #[test]
    fn short_updates_do_not_carry_seq() {
        let combined = adapt(
            tl::enums::Updates::UpdateShort(tl::types::UpdateShort {
                update: tl::enums::Update::LoginToken,
                date: 7,
            })
            .into(),
        )
        .unwrap();
        assert_eq!(combined.date, 7);
        assert_eq!(combined.seq_start, NO_SEQ);
        assert_eq!(combined.seq, NO_SEQ);
        assert_eq!(combined.updates, vec![Update::Raw(tl::enums::Update::LoginToken)]);
    }

    #[test]
    fn updates_use_seq_as_seq_start() {
        let combined = adapt(
            tl::enums::Updates::Updates(tl::types::Updates {
                updates: Vec::new(),
                users: Vec::new(),
                chats: Vec::new(),
                date: 3,
                seq: 4,
            })
            .into(),
        )
        .unwrap();
        assert_eq!((combined.seq_start, combined.seq), (4, 4));
    }

    #[test]
    fn too_long_and_closed_connections_are_gaps() {
        assert!(matches!(
            adapt(tl::enums::Updates::TooLong.into()),
            Err(Gap)
        ));
        assert!(matches!(adapt(UpdatesLike::ConnectionClosed), Err(Gap)));
    }

    #[test]
    fn channel_messages_need_a_known_channel() {
        assert_eq!(PtsInfo::from_update(&channel_message(None)), None);
        assert_eq!(
            PtsInfo::from_update(&channel_message(Some(
                tl::types::PeerChannel { channel_id: 5 }.into()
            ))),
            Some(PtsInfo {
                pts: 10,
                pts_count: 1,
                entry: Entry::Channel(5),
            })
        );
    }

    #[test]
    fn zero_qts_carries_no_order() {
        let stopped = tl::types::UpdateBotStopped {
            user_id: 1,
            date: 2,
            stopped: true,
            qts: NO_PTS,
        };
        assert_eq!(
            PtsInfo::from_update(&tl::enums::Update::BotStopped(stopped).into()),
            None
        );
    }

    #[test]
    fn read_channel_inbox_has_no_count() {
        let read = tl::types::UpdateReadChannelInbox {
            folder_id: None,
            channel_id: 8,
            max_id: 100,
            still_unread_count: 0,
            pts: 12,
        };
        assert_eq!(
            PtsInfo::from_update(&tl::enums::Update::ReadChannelInbox(read).into()),
            Some(PtsInfo {
                pts: 12,
                pts_count: 0,
                entry: Entry::Channel(8),
            })
        );
    }
}
