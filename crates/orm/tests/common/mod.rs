#![allow(dead_code)]

use std::sync::Arc;

use docket_orm::backends::memory::MemoryAdapter;
use docket_orm::{Collection, DatabaseStore, Model};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub guild_id: String,
    #[serde(default)]
    pub prefix: String,
}

impl Model for Guild {
    const COLLECTION: Collection = Collection::Guilds;

    fn id_parts(&self) -> Vec<String> {
        vec![self.guild_id.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub guild_id: String,
    pub author_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub topic: String,
}

impl Model for Ticket {
    const COLLECTION: Collection = Collection::Tickets;

    fn id_parts(&self) -> Vec<String> {
        vec![self.guild_id.clone(), self.author_id.clone(), self.channel_id.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildStatistics {
    pub guild_id: String,
    #[serde(default)]
    pub tickets_opened: u64,
}

impl Model for GuildStatistics {
    const COLLECTION: Collection = Collection::GuildStatistics;

    fn id_parts(&self) -> Vec<String> {
        vec![self.guild_id.clone()]
    }
}

pub fn ticket(guild: &str, author: &str, channel: &str) -> Ticket {
    Ticket {
        guild_id: guild.to_string(),
        author_id: author.to_string(),
        channel_id: channel.to_string(),
        topic: format!("{} needs help", author),
    }
}

pub fn memory_store() -> DatabaseStore {
    DatabaseStore::builder()
        .adapter(Arc::new(MemoryAdapter::default()))
        .register::<Guild>()
        .register::<Ticket>()
        .register::<GuildStatistics>()
        .build()
        .unwrap()
}
