//! Data migrations of the bot, registered oldest first

mod m20240115000000_guild_statistics;
mod m20240220000000_warning_counts;

use docket_orm::Migration;

pub use m20240115000000_guild_statistics::GuildStatisticsMigration;
pub use m20240220000000_warning_counts::WarningCountsMigration;

pub fn all() -> Vec<Box<dyn Migration>> {
    vec![Box::new(GuildStatisticsMigration), Box::new(WarningCountsMigration)]
}
