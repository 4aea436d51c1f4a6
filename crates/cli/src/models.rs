//! Document types of the bot, one per collection

use docket_orm::{Collection, Model, ModelRegistry};
use serde::{Deserialize, Serialize};

/// Per-guild settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub guild_id: String,
    #[serde(default)]
    pub ticket_category_id: Option<String>,
    #[serde(default)]
    pub log_channel_id: Option<String>,
    #[serde(default)]
    pub entry_role_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub praise_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    pub target_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub guild_id: String,
    pub author_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub guild_id: String,
    pub target_id: String,
    pub created_at: String,
    pub moderator_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Praise {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    pub target_id: String,
}

/// Useful links a guild shares with its members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub guild_id: String,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    pub content: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub guild_id: String,
    pub author_id: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildStatistics {
    pub guild_id: String,
    #[serde(default)]
    pub tickets_opened: u64,
    #[serde(default)]
    pub warnings_issued: u64,
}

macro_rules! impl_model {
    ($model:ty, $collection:expr, [$($part:ident),*]) => {
        impl Model for $model {
            const COLLECTION: Collection = $collection;

            fn id_parts(&self) -> Vec<String> {
                vec![$(self.$part.clone()),*]
            }
        }
    };
}

impl_model!(Guild, Collection::Guilds, [guild_id]);
impl_model!(User, Collection::Users, [user_id]);
impl_model!(Report, Collection::Reports, [guild_id, author_id, created_at]);
impl_model!(Ticket, Collection::Tickets, [guild_id, author_id, channel_id]);
impl_model!(Warning, Collection::Warnings, [guild_id, target_id, created_at]);
impl_model!(Praise, Collection::Praises, [guild_id, author_id, created_at]);
impl_model!(Resource, Collection::Resources, [guild_id]);
impl_model!(Suggestion, Collection::Suggestions, [guild_id, author_id, created_at]);
impl_model!(EntryRequest, Collection::EntryRequests, [guild_id, author_id]);
impl_model!(GuildStatistics, Collection::GuildStatistics, [guild_id]);

/// Registry with every model of the bot
pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .register::<Guild>()
        .register::<User>()
        .register::<Report>()
        .register::<Ticket>()
        .register::<Warning>()
        .register::<Praise>()
        .register::<Resource>()
        .register::<Suggestion>()
        .register::<EntryRequest>()
        .register::<GuildStatistics>();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_collection_except_metadata_is_registered() {
        let registry = registry();
        for collection in Collection::ALL {
            assert_eq!(
                registry.is_registered(collection),
                collection != Collection::DatabaseMetadata,
                "{}",
                collection
            );
        }
    }

    #[test]
    fn test_ticket_identifier() {
        let ticket = Ticket {
            guild_id: "g1".to_string(),
            author_id: "a1".to_string(),
            channel_id: "c1".to_string(),
            closed: false,
        };
        assert_eq!(ticket.id().unwrap(), "Tickets/g1/a1/c1");
    }
}
