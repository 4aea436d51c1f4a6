//! One statistics document per guild, seeded with its ticket count

use async_trait::async_trait;
use docket_orm::{DatabaseStore, Migration, ModelQueries, OrmResult};

use crate::models::{Guild, GuildStatistics, Ticket};

pub struct GuildStatisticsMigration;

#[async_trait]
impl Migration for GuildStatisticsMigration {
    fn name(&self) -> &str {
        "20240115000000_guild_statistics"
    }

    async fn up(&self, store: &DatabaseStore) -> OrmResult<()> {
        let mut session = store.open_session().await?;
        let guilds = Guild::all(session.as_mut(), &[]).await?;

        for guild in &guilds {
            let guild_id = guild.data().guild_id.as_str();
            let tickets = Ticket::all(session.as_mut(), &[("guildId", guild_id)]).await?;

            let mut statistics = GuildStatistics::get_or_create(
                store,
                GuildStatistics {
                    guild_id: guild_id.to_string(),
                    ..GuildStatistics::default()
                },
            )
            .await?;
            statistics.data_mut().tickets_opened = tickets.len() as u64;
            statistics.update(session.as_mut()).await?;
        }

        tracing::info!(guilds = guilds.len(), "seeded guild statistics");
        session.close().await
    }

    async fn down(&self, store: &DatabaseStore) -> OrmResult<()> {
        let mut session = store.open_session().await?;
        for mut statistics in GuildStatistics::all(session.as_mut(), &[]).await? {
            statistics.delete(session.as_mut()).await?;
        }
        session.close().await
    }
}
