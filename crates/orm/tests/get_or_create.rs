mod common;

use common::{memory_store, Guild, GuildStatistics};
use docket_orm::ModelQueries;

#[tokio::test]
async fn test_get_or_create_creates_then_returns_existing() {
    let store = memory_store();
    let created = Guild::get_or_create(
        &store,
        Guild {
            guild_id: "1".to_string(),
            prefix: "!".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(created.id(), "Guilds/1");

    let existing = Guild::get_or_create(
        &store,
        Guild {
            guild_id: "1".to_string(),
            prefix: "?".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(existing.data().prefix, "!");
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_document() {
    let store = memory_store();
    let calls = (0..8u64).map(|i| {
        GuildStatistics::get_or_create(
            &store,
            GuildStatistics {
                guild_id: "7".to_string(),
                tickets_opened: i,
            },
        )
    });
    let results = futures::future::try_join_all(calls).await.unwrap();

    // Every caller sees the first writer's document.
    assert!(results.iter().all(|document| document.data().tickets_opened == 0));
    let mut session = store.open_session().await.unwrap();
    let all = GuildStatistics::all(session.as_mut(), &[]).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_get_or_create_releases_its_lock() {
    let store = memory_store();
    for id in 0..16u64 {
        GuildStatistics::get_or_create(
            &store,
            GuildStatistics {
                guild_id: id.to_string(),
                tickets_opened: 0,
            },
        )
        .await
        .unwrap();
    }
    assert!(store.locks().is_empty());

    let calls = (0..4u64).map(|i| {
        GuildStatistics::get_or_create(
            &store,
            GuildStatistics {
                guild_id: "shared".to_string(),
                tickets_opened: i,
            },
        )
    });
    futures::future::try_join_all(calls).await.unwrap();
    assert!(store.locks().is_empty());
}
