//! # Demo Commands
//!
//! Top-level packet types. The message type of an envelope, with the
//! compressed flag cleared, is one of these ids.

use std::fmt;

/// Top-level demo command ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum DemoCommand {
    /// End of stream marker.
    Stop = 0,
    /// File header message.
    FileHeader = 1,
    /// Trailing file summary.
    FileInfo = 2,
    /// Tick synchronisation point.
    SyncTick = 3,
    /// Serialized send tables.
    SendTables = 4,
    /// Server class list.
    ClassInfo = 5,
    /// String table snapshot.
    StringTables = 6,
    /// Wrapper around network messages.
    Packet = 7,
    /// Wrapper around signon network messages.
    SignonPacket = 8,
    /// Console command.
    ConsoleCmd = 9,
    /// Game specific data.
    CustomData = 10,
    /// Callbacks for [`DemoCommand::CustomData`].
    CustomDataCallbacks = 11,
    /// User input command.
    UserCmd = 12,
    /// Full world snapshot.
    FullPacket = 13,
    /// Saved game state.
    SaveGame = 14,
    /// Spawn group manifest.
    SpawnGroups = 15,
    /// Animation data.
    AnimationData = 16,
}

impl DemoCommand {
    /// Every command, indexed by id.
    pub const ALL: [Self; 17] = [
        Self::Stop,
        Self::FileHeader,
        Self::FileInfo,
        Self::SyncTick,
        Self::SendTables,
        Self::ClassInfo,
        Self::StringTables,
        Self::Packet,
        Self::SignonPacket,
        Self::ConsoleCmd,
        Self::CustomData,
        Self::CustomDataCallbacks,
        Self::UserCmd,
        Self::FullPacket,
        Self::SaveGame,
        Self::SpawnGroups,
        Self::AnimationData,
    ];

    /// Looks up a command by id.
    #[must_use]
    pub fn from_u32(id: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(id).ok()?).copied()
    }

    /// Command name as it appears in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::FileHeader => "FileHeader",
            Self::FileInfo => "FileInfo",
            Self::SyncTick => "SyncTick",
            Self::SendTables => "SendTables",
            Self::ClassInfo => "ClassInfo",
            Self::StringTables => "StringTables",
            Self::Packet => "Packet",
            Self::SignonPacket => "SignonPacket",
            Self::ConsoleCmd => "ConsoleCmd",
            Self::CustomData => "CustomData",
            Self::CustomDataCallbacks => "CustomDataCallbacks",
            Self::UserCmd => "UserCmd",
            Self::FullPacket => "FullPacket",
            Self::SaveGame => "SaveGame",
            Self::SpawnGroups => "SpawnGroups",
            Self::AnimationData => "AnimationData",
        }
    }
}

impl fmt::Display for DemoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
