use chrono::{Duration as ChronoDuration, Utc};
use engagement_core::{
    ConnectionPool, Deadline, Relationship, RelationshipStore, SqliteRelationshipStore,
    StoreError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn store() -> SqliteRelationshipStore {
    let pool = Arc::new(ConnectionPool::open_in_memory().unwrap());
    let store = SqliteRelationshipStore::new(pool);
    store.ensure_indexes(deadline()).unwrap();
    store
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(3))
}

#[test]
fn create_returns_persisted_edge() {
    let store = store();
    let edge = Relationship::new(Uuid::new_v4(), Uuid::new_v4());

    let stored = store.create(deadline(), &edge).unwrap();
    assert_eq!(stored.id, edge.id);
    assert_eq!(stored.follower_id, edge.follower_id);
    assert_eq!(stored.followee_id, edge.followee_id);
    assert!(stored.approved);
    assert!(stored.is_active());
    assert_eq!(
        stored.created_at.timestamp_millis(),
        edge.created_at.timestamp_millis()
    );
    assert!(store
        .is_active(deadline(), edge.follower_id, edge.followee_id)
        .unwrap());
}

#[test]
fn create_rejects_live_duplicate() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.create(deadline(), &Relationship::new(a, b)).unwrap();

    let err = store
        .create(deadline(), &Relationship::new(a, b))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DuplicateRelationship { follower_id, followee_id }
            if follower_id == a && followee_id == b
    ));
    assert_eq!(store.count_following(deadline(), a).unwrap(), 1);
}

#[test]
fn reverse_direction_is_a_distinct_edge() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.create(deadline(), &Relationship::new(a, b)).unwrap();
    store.create(deadline(), &Relationship::new(b, a)).unwrap();

    assert_eq!(store.count_followers(deadline(), a).unwrap(), 1);
    assert_eq!(store.count_following(deadline(), a).unwrap(), 1);
}

#[test]
fn create_rejects_invalid_edges() {
    let store = store();
    let user = Uuid::new_v4();

    let self_edge = Relationship::new(user, user);
    assert!(matches!(
        store.create(deadline(), &self_edge),
        Err(StoreError::InvalidArgument(_))
    ));

    let nil_edge = Relationship::new(Uuid::nil(), user);
    assert!(matches!(
        store.create(deadline(), &nil_edge),
        Err(StoreError::InvalidArgument(_))
    ));

    let mut tombstoned = Relationship::new(user, Uuid::new_v4());
    tombstoned.deleted_at = Some(tombstoned.created_at);
    assert!(matches!(
        store.create(deadline(), &tombstoned),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn soft_delete_then_second_delete_reports_not_found() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let created = store.create(deadline(), &Relationship::new(a, b)).unwrap();

    let deleted_at = store.soft_delete(deadline(), a, b).unwrap();
    assert!(deleted_at >= created.created_at);
    assert!(!store.is_active(deadline(), a, b).unwrap());

    assert!(matches!(
        store.soft_delete(deadline(), a, b),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn soft_delete_of_unknown_pair_reports_not_found() {
    let store = store();
    assert!(matches!(
        store.soft_delete(deadline(), Uuid::new_v4(), Uuid::new_v4()),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn refollow_reactivates_tombstoned_row_in_place() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let first = store.create(deadline(), &Relationship::new(a, b)).unwrap();
    store.soft_delete(deadline(), a, b).unwrap();

    let later = Relationship::at(a, b, first.created_at + ChronoDuration::seconds(10));
    let reactivated = store.create(deadline(), &later).unwrap();
    assert_eq!(reactivated.id, first.id);
    assert_eq!(reactivated.created_at, later.created_at);
    assert!(reactivated.is_active());
    assert_eq!(store.count_followers(deadline(), b).unwrap(), 1);
}

#[test]
fn hard_delete_removes_live_and_tombstoned_rows() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.create(deadline(), &Relationship::new(a, b)).unwrap();
    store.soft_delete(deadline(), a, b).unwrap();

    store.hard_delete(deadline(), a, b).unwrap();
    assert!(matches!(
        store.hard_delete(deadline(), a, b),
        Err(StoreError::NotFound { .. })
    ));

    let fresh = Relationship::new(a, b);
    let stored = store.create(deadline(), &fresh).unwrap();
    assert_eq!(stored.id, fresh.id);
}

#[test]
fn lists_exclude_tombstones_and_counts_match() {
    let store = store();
    let celebrity = Uuid::new_v4();
    let fans: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for fan in &fans {
        store
            .create(deadline(), &Relationship::new(*fan, celebrity))
            .unwrap();
    }
    store.soft_delete(deadline(), fans[1], celebrity).unwrap();
    store.soft_delete(deadline(), fans[3], celebrity).unwrap();

    let followers = store
        .list_followers(deadline(), celebrity, 50, 0)
        .unwrap();
    let listed: HashSet<Uuid> = followers.iter().map(|edge| edge.follower_id).collect();
    let expected: HashSet<Uuid> = [fans[0], fans[2], fans[4]].into_iter().collect();
    assert_eq!(listed, expected);
    assert!(followers.iter().all(Relationship::is_active));
    assert_eq!(
        store.count_followers(deadline(), celebrity).unwrap(),
        followers.len() as u64
    );

    let following = store.list_following(deadline(), fans[1], 10, 0).unwrap();
    assert!(following.is_empty());
    assert_eq!(store.count_following(deadline(), fans[1]).unwrap(), 0);
}

#[test]
fn lists_are_newest_first_and_paginate() {
    let store = store();
    let user = Uuid::new_v4();
    let base = Utc::now();
    let mut followees = Vec::new();
    for minutes in 0..4 {
        let followee = Uuid::new_v4();
        followees.push(followee);
        let edge = Relationship::at(user, followee, base + ChronoDuration::minutes(minutes));
        store.create(deadline(), &edge).unwrap();
    }

    let first_page = store.list_following(deadline(), user, 2, 0).unwrap();
    let second_page = store.list_following(deadline(), user, 2, 2).unwrap();
    let ordered: Vec<Uuid> = first_page
        .iter()
        .chain(second_page.iter())
        .map(|edge| edge.followee_id)
        .collect();
    let expected: Vec<Uuid> = followees.into_iter().rev().collect();
    assert_eq!(ordered, expected);

    assert!(store.list_following(deadline(), user, 2, 10).unwrap().is_empty());
}

#[test]
fn invalid_pagination_fails_regardless_of_data() {
    let store = store();
    let user = Uuid::new_v4();
    store
        .create(deadline(), &Relationship::new(Uuid::new_v4(), user))
        .unwrap();

    for (limit, offset) in [(0, 0), (-5, 0), (10, -1)] {
        assert!(matches!(
            store.list_followers(deadline(), user, limit, offset),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.list_following(deadline(), user, limit, offset),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}

#[test]
fn expired_deadline_surfaces_timeout_without_writing() {
    let store = store();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let err = store
        .create(Deadline::after(Duration::ZERO), &Relationship::new(a, b))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Timeout {
            operation: "relationship.create",
            ..
        }
    ));
    assert!(!store.is_active(deadline(), a, b).unwrap());
}
