//! Count issued warnings on each guild's statistics

use async_trait::async_trait;
use docket_orm::{DatabaseStore, Migration, ModelQueries, OrmResult};

use crate::models::{GuildStatistics, Warning};

pub struct WarningCountsMigration;

#[async_trait]
impl Migration for WarningCountsMigration {
    fn name(&self) -> &str {
        "20240220000000_warning_counts"
    }

    async fn up(&self, store: &DatabaseStore) -> OrmResult<()> {
        let mut session = store.open_session().await?;
        for mut statistics in GuildStatistics::all(session.as_mut(), &[]).await? {
            let guild_id = statistics.data().guild_id.clone();
            let warnings = Warning::all(session.as_mut(), &[("guildId", guild_id.as_str())]).await?;
            statistics.data_mut().warnings_issued = warnings.len() as u64;
            statistics.update(session.as_mut()).await?;
        }
        session.close().await
    }

    async fn down(&self, store: &DatabaseStore) -> OrmResult<()> {
        let mut session = store.open_session().await?;
        for mut statistics in GuildStatistics::all(session.as_mut(), &[]).await? {
            statistics.data_mut().warnings_issued = 0;
            statistics.update(session.as_mut()).await?;
        }
        session.close().await
    }
}
