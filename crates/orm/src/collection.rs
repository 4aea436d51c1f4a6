//! The closed set of document kinds
//!
//! A `Collection` is both the routing key for a document and the namespace
//! of its identifier. The id-part tuple of each collection is fixed: the
//! names and their order are part of every identifier ever issued, so they
//! must never be reordered.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Guilds,
    Users,
    Reports,
    Tickets,
    Warnings,
    Praises,
    Resources,
    Suggestions,
    EntryRequests,
    DatabaseMetadata,
    GuildStatistics,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Guilds,
        Collection::Users,
        Collection::Reports,
        Collection::Tickets,
        Collection::Warnings,
        Collection::Praises,
        Collection::Resources,
        Collection::Suggestions,
        Collection::EntryRequests,
        Collection::DatabaseMetadata,
        Collection::GuildStatistics,
    ];

    /// Tag used in identifiers and as the native collection/table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Guilds => "Guilds",
            Collection::Users => "Users",
            Collection::Reports => "Reports",
            Collection::Tickets => "Tickets",
            Collection::Warnings => "Warnings",
            Collection::Praises => "Praises",
            Collection::Resources => "Resources",
            Collection::Suggestions => "Suggestions",
            Collection::EntryRequests => "EntryRequests",
            Collection::DatabaseMetadata => "DatabaseMetadata",
            Collection::GuildStatistics => "GuildStatistics",
        }
    }

    /// Ordered id-part field names. Append-only in spirit: never reorder.
    pub fn id_parts(&self) -> &'static [&'static str] {
        match self {
            Collection::Guilds => &["guildId"],
            Collection::Users => &["userId"],
            Collection::Reports => &["guildId", "authorId", "createdAt"],
            Collection::Tickets => &["guildId", "authorId", "channelId"],
            Collection::Warnings => &["guildId", "targetId", "createdAt"],
            Collection::Praises => &["guildId", "authorId", "createdAt"],
            Collection::Resources => &["guildId"],
            Collection::Suggestions => &["guildId", "authorId", "createdAt"],
            Collection::EntryRequests => &["guildId", "authorId"],
            Collection::DatabaseMetadata => &[],
            Collection::GuildStatistics => &["guildId"],
        }
    }

    pub fn arity(&self) -> usize {
        self.id_parts().len()
    }

    pub fn has_id_part(&self, name: &str) -> bool {
        self.id_parts().contains(&name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing is exact; the tag is case-sensitive.
impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown collection: {}", s))
    }
}
