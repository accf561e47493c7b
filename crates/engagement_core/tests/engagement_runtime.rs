use engagement_core::event::PublishedMessage;
use engagement_core::{bootstrap, ChannelPublisher, EngagementConfig, FollowCounts};
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

#[test]
fn file_backed_runtime_from_toml_config() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[database]
path = "{}"
pool_size = 2

[store]
op_timeout_ms = 2000

[events]
exchange = "social"
queue_capacity = 16
shutdown_grace_ms = 2000
"#,
        db_path.display()
    )
    .unwrap();

    let config = EngagementConfig::load_from_file(file.path()).unwrap();
    config.validate().unwrap();
    let (publisher, rx) = ChannelPublisher::new(config.events.exchange.clone(), 16);
    let runtime = bootstrap(&config, Arc::new(publisher)).unwrap();
    assert_eq!(runtime.pool().size(), 2);

    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    runtime.subscriptions().follow(alice, bob).unwrap();
    runtime.subscriptions().follow(carol, bob).unwrap();
    runtime.subscriptions().follow(bob, alice).unwrap();
    runtime.subscriptions().unfollow(carol, bob).unwrap();

    assert_eq!(
        runtime.queries().follow_counts(bob).unwrap(),
        FollowCounts {
            followers: 1,
            following: 1
        }
    );
    assert!(runtime.queries().is_following(alice, bob).unwrap());
    assert!(!runtime.queries().is_following(carol, bob).unwrap());

    let post = Uuid::new_v4();
    runtime.reactions().like(alice, post).unwrap();
    assert_eq!(runtime.queries().reaction_count(post).unwrap(), 1);

    let report = runtime.shutdown();
    assert!(report.drained);
    assert_eq!(report.stats.published, 4);

    let messages: Vec<PublishedMessage> = rx.try_iter().collect();
    assert_eq!(messages.len(), 4);
    assert!(messages.iter().all(|message| message.exchange == "social"));
    assert_eq!(
        messages
            .iter()
            .filter(|message| message.routing_key == "subscription.deleted")
            .count(),
        1
    );
}

#[test]
fn reopening_database_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngagementConfig::default();
    config.database.path = dir.path().join("engagement.db").display().to_string();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    {
        let (publisher, _rx) = ChannelPublisher::new("engagement", 4);
        let runtime = bootstrap(&config, Arc::new(publisher)).unwrap();
        runtime.subscriptions().follow(a, b).unwrap();
        runtime.shutdown();
    }

    let (publisher, _rx) = ChannelPublisher::new("engagement", 4);
    let runtime = bootstrap(&config, Arc::new(publisher)).unwrap();
    assert!(runtime.queries().is_following(a, b).unwrap());
    assert!(runtime.subscriptions().follow(a, b).is_err());
    runtime.shutdown();
}
