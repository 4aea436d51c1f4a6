mod common;

use common::{memory_store, ticket, Guild, Ticket};
use docket_orm::{ModelError, ModelQueries};

#[tokio::test]
async fn test_store_then_load_round_trip() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();

    let mut document = store.document(ticket("g1", "a1", "c1")).unwrap();
    document.create(session.as_mut()).await.unwrap();
    assert_eq!(document.id(), "Tickets/g1/a1/c1");

    let loaded = session.load("Tickets/g1/a1/c1").await.unwrap().unwrap();
    let loaded = loaded.downcast::<Ticket>().unwrap();
    assert_eq!(loaded.data(), document.data());
    assert_eq!(loaded.data().guild_id, "g1");
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_load_of_missing_id_is_none() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    assert!(session.load("Tickets/g1/a1/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_of_unknown_collection_fails() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    let err = session.load("Nonsense/1").await.unwrap_err();
    assert!(matches!(err, ModelError::UnknownCollection { .. }));
}

#[tokio::test]
async fn test_load_many_preserves_order_with_missing_ids() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    for channel in ["c1", "c2"] {
        store
            .document(ticket("g1", "a1", channel))
            .unwrap()
            .create(session.as_mut())
            .await
            .unwrap();
    }

    let ids = vec![
        "Tickets/g1/a1/c2".to_string(),
        "Tickets/g1/a1/missing".to_string(),
        "Tickets/g1/a1/c1".to_string(),
    ];
    let found = Ticket::find_many(session.as_mut(), &ids).await.unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].as_ref().map(|d| d.id()), Some("Tickets/g1/a1/c2"));
    assert!(found[1].is_none());
    assert_eq!(found[2].as_ref().map(|d| d.id()), Some("Tickets/g1/a1/c1"));
}

#[tokio::test]
async fn test_find_by_parts() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    store
        .document(Guild {
            guild_id: "42".to_string(),
            prefix: "!".to_string(),
        })
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap();

    let guild = Guild::find(session.as_mut(), &["42"]).await.unwrap().unwrap();
    assert_eq!(guild.data().prefix, "!");

    let err = Guild::find_or_fail(session.as_mut(), &["43"]).await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(id) if id == "Guilds/43"));

    let err = Guild::find(session.as_mut(), &["4/2"]).await.unwrap_err();
    assert!(matches!(err, ModelError::MalformedId { .. }));
}

#[tokio::test]
async fn test_find_with_wrong_model_type_is_type_mismatch() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    store
        .document(Guild {
            guild_id: "42".to_string(),
            prefix: String::new(),
        })
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap();

    let loaded = session.load("Guilds/42").await.unwrap().unwrap();
    let err = loaded.downcast::<Ticket>().unwrap_err();
    assert!(matches!(err, ModelError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_all_filters_on_id_parts() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    for (guild, author, channel) in [("123", "a1", "c1"), ("123", "a2", "c2"), ("456", "a1", "c3")] {
        store
            .document(ticket(guild, author, channel))
            .unwrap()
            .create(session.as_mut())
            .await
            .unwrap();
    }

    let tickets = Ticket::all(session.as_mut(), &[("guildId", "123")]).await.unwrap();
    let ids: Vec<&str> = tickets.iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["Tickets/123/a1/c1", "Tickets/123/a2/c2"]);

    let by_author = Ticket::all(session.as_mut(), &[("authorId", "a1")]).await.unwrap();
    assert_eq!(by_author.len(), 2);

    let everything = Ticket::all(session.as_mut(), &[]).await.unwrap();
    assert_eq!(everything.len(), 3);

    let err = Ticket::all(session.as_mut(), &[("topic", "x")]).await.unwrap_err();
    assert!(matches!(err, ModelError::Query(_)));
}

#[tokio::test]
async fn test_query_by_regex_and_id() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    for channel in ["c1", "c2", "d1"] {
        store
            .document(ticket("g1", "a1", channel))
            .unwrap()
            .create(session.as_mut())
            .await
            .unwrap();
    }

    let matched = session
        .query(docket_orm::Collection::Tickets)
        .where_regex("id", "/c[0-9]$")
        .execute_as::<Ticket>()
        .await
        .unwrap();
    assert_eq!(matched.len(), 2);

    let exact = session
        .query(docket_orm::Collection::Tickets)
        .where_equals("id", "Tickets/g1/a1/d1")
        .execute_as::<Ticket>()
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].data().channel_id, "d1");

    let err = session
        .query(docket_orm::Collection::Tickets)
        .where_equals("bad-name", "x")
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Query(_)));
}

#[tokio::test]
async fn test_create_twice_is_already_exists() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    store
        .document(ticket("g1", "a1", "c1"))
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap();

    let err = store
        .document(ticket("g1", "a1", "c1"))
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_stale_revision_is_conflict() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    store
        .document(ticket("g1", "a1", "c1"))
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap();

    let mut first = Ticket::find_or_fail(session.as_mut(), &["g1", "a1", "c1"]).await.unwrap();
    let mut second = Ticket::find_or_fail(session.as_mut(), &["g1", "a1", "c1"]).await.unwrap();

    first.data_mut().topic = "first".to_string();
    first.update(session.as_mut()).await.unwrap();
    assert_eq!(first.revision(), Some("2"));

    second.data_mut().topic = "second".to_string();
    let err = second.update(session.as_mut()).await.unwrap_err();
    assert!(matches!(err, ModelError::Conflict { .. }));

    let current = Ticket::find_or_fail(session.as_mut(), &["g1", "a1", "c1"]).await.unwrap();
    assert_eq!(current.data().topic, "first");
}

#[tokio::test]
async fn test_update_rejects_changed_id_parts() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    let mut document = store.document(ticket("g1", "a1", "c1")).unwrap();
    document.create(session.as_mut()).await.unwrap();

    document.data_mut().channel_id = "c2".to_string();
    let err = document.update(session.as_mut()).await.unwrap_err();
    assert!(matches!(err, ModelError::MalformedId { .. }));
}

#[tokio::test]
async fn test_delete_removes_document() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    let mut document = store.document(ticket("g1", "a1", "c1")).unwrap();
    document.create(session.as_mut()).await.unwrap();

    document.delete(session.as_mut()).await.unwrap();
    assert!(document.is_deleted());
    assert!(session.load("Tickets/g1/a1/c1").await.unwrap().is_none());
    assert!(Ticket::all(session.as_mut(), &[]).await.unwrap().is_empty());

    // Deleting again is a no-op.
    document.delete(session.as_mut()).await.unwrap();
}

#[tokio::test]
async fn test_sessions_share_the_adapter_data() {
    let store = memory_store();
    let mut writer = store.open_session().await.unwrap();
    let mut reader = store.open_session().await.unwrap();

    store
        .document(ticket("g1", "a1", "c1"))
        .unwrap()
        .create(writer.as_mut())
        .await
        .unwrap();
    assert!(reader.load("Tickets/g1/a1/c1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_of_deleted_document_is_conflict() {
    let store = memory_store();
    let mut session = store.open_session().await.unwrap();
    store
        .document(ticket("g1", "a1", "c1"))
        .unwrap()
        .create(session.as_mut())
        .await
        .unwrap();

    let mut stale = Ticket::find_or_fail(session.as_mut(), &["g1", "a1", "c1"]).await.unwrap();
    let mut current = Ticket::find_or_fail(session.as_mut(), &["g1", "a1", "c1"]).await.unwrap();
    current.delete(session.as_mut()).await.unwrap();

    stale.data_mut().topic = "revived".to_string();
    let err = stale.update(session.as_mut()).await.unwrap_err();
    assert!(matches!(err, ModelError::Conflict { .. }));
    assert!(session.load("Tickets/g1/a1/c1").await.unwrap().is_none());
}
