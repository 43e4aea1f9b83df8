use datadesk_core::model::account::{AccountChanges, NewAccount};
use datadesk_core::repo::account_repo::AccountRepository;
use datadesk_core::validation::account::{AccountInput, AccountQuery};
use datadesk_core::validation::common::BatchRequest;
use datadesk_core::{
    open_db_in_memory, AccountService, ErrorKind, LifecycleState, RepoError, ServiceError,
};
use serde_json::{from_value, json};

fn input(payload: serde_json::Value) -> AccountInput {
    from_value(payload).unwrap()
}

fn new_account(handle: &str, contact: Option<&str>) -> NewAccount {
    NewAccount {
        handle: handle.to_string(),
        contact_address: contact.map(str::to_string),
        avatar_reference: None,
        lifecycle_state: LifecycleState::Active,
    }
}

#[test]
fn repository_rejects_duplicate_handle_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let repo = AccountRepository::new(&conn);

    repo.create(&new_account("admin", Some("a@x.com"))).unwrap();
    let err = repo
        .create(&new_account("admin", Some("b@x.com")))
        .unwrap_err();

    match err {
        RepoError::Conflict(conflict) => {
            assert_eq!(conflict.field, "handle");
            assert_eq!(conflict.value, "admin");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.base().count(&[]).unwrap(), 1);
}

#[test]
fn service_create_sanitizes_and_returns_stored_row() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    let created = service
        .create(&input(json!({
            "handle": "  alice  ",
            "contactAddress": "Alice@Example.COM"
        })))
        .unwrap();

    assert!(created.id > 0);
    assert_eq!(created.handle, "alice");
    assert_eq!(created.contact_address.as_deref(), Some("alice@example.com"));
    assert_eq!(created.lifecycle_state, LifecycleState::Active);
    assert!(created.created_at > 0);
    assert_eq!(service.get(created.id).unwrap(), created);
}

#[test]
fn service_refuses_reserved_and_malformed_handles() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    let err = service.create(&input(json!({"handle": "Admin"}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "handle is reserved");

    let err = service
        .create(&input(json!({"handle": "9lives", "contactAddress": "nope"})))
        .unwrap_err();
    let validation = err.validation().unwrap();
    assert!(!validation.field_errors("handle").is_empty());
    assert!(!validation.field_errors("contactAddress").is_empty());
}

#[test]
fn blank_handle_is_required_on_create_and_update() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    let err = service.create(&input(json!({"handle": "   "}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.validation().unwrap().field_errors("handle"),
        vec!["handle is required"]
    );

    let erin = service.create(&input(json!({"handle": "erin"}))).unwrap();
    let err = service
        .update(erin.id, &input(json!({"handle": " \t "})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.get(erin.id).unwrap().handle, "erin");
    assert_eq!(
        AccountRepository::new(&conn).base().count(&[]).unwrap(),
        1
    );
}

#[test]
fn handle_conflict_excludes_the_row_being_updated() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);
    let alice = service.create(&input(json!({"handle": "alice"}))).unwrap();
    let bob = service.create(&input(json!({"handle": "bob"}))).unwrap();

    let err = service
        .update(bob.id, &input(json!({"handle": "alice"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UniquenessConflict);
    match err {
        ServiceError::Conflict(conflict) => assert_eq!(conflict.field, "handle"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.get(bob.id).unwrap().handle, "bob");

    let kept = service
        .update(alice.id, &input(json!({"handle": "alice"})))
        .unwrap();
    assert_eq!(kept.handle, "alice");
}

#[test]
fn repeated_empty_update_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);
    let created = service
        .create(&input(json!({"handle": "frank", "contactAddress": "f@x.com"})))
        .unwrap();

    let first = service.update(created.id, &input(json!({}))).unwrap();
    let second = service.update(created.id, &input(json!({}))).unwrap();
    assert_eq!(first, created);
    assert_eq!(second, first);

    let err = service.update(created.id + 100, &input(json!({}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn contact_conflict_excludes_the_row_being_updated() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);
    let alice = service
        .create(&input(json!({"handle": "alice", "contactAddress": "a@x.com"})))
        .unwrap();
    let bob = service
        .create(&input(json!({"handle": "bob", "contactAddress": "b@x.com"})))
        .unwrap();

    let same = service
        .update(alice.id, &input(json!({"contactAddress": "A@X.com"})))
        .unwrap();
    assert_eq!(same.contact_address.as_deref(), Some("a@x.com"));

    let err = service
        .update(bob.id, &input(json!({"contactAddress": "a@x.com"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UniquenessConflict);
    match err {
        ServiceError::Conflict(conflict) => assert_eq!(conflict.field, "contactAddress"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_update_returns_record_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = AccountRepository::new(&conn);
    let created = repo.create(&new_account("carol", None)).unwrap();

    let unchanged = repo
        .update(created.id, &AccountChanges::default())
        .unwrap()
        .unwrap();
    assert_eq!(unchanged, created);
}

#[test]
fn explicit_null_clears_nullable_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);
    let created = service
        .create(&input(json!({
            "handle": "dave",
            "contactAddress": "dave@x.com",
            "avatarReference": "https://cdn.example.com/dave.png"
        })))
        .unwrap();

    let updated = service
        .update(created.id, &input(json!({"avatarReference": null})))
        .unwrap();
    assert_eq!(updated.avatar_reference, None);
    assert_eq!(updated.contact_address.as_deref(), Some("dave@x.com"));
}

#[test]
fn missing_records_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    assert_eq!(service.get(404).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.delete(404).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service
            .update(404, &input(json!({"handle": "ghost"})))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn batch_deactivate_and_statistics() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);
    let ids: Vec<i64> = ["erin", "frank", "grace", "heidi"]
        .iter()
        .map(|handle| service.create(&input(json!({"handle": handle}))).unwrap().id)
        .collect();

    let outcome = service
        .batch(&BatchRequest {
            ids: json!([ids[0], ids[1], ids[2]]),
            operation: "deactivate".to_string(),
            data: json!(null),
        })
        .unwrap();
    assert_eq!(outcome.requested, 3);
    assert_eq!(outcome.affected, 3);

    let stats = service.statistics().unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.inactive, 3);
    assert_eq!(stats.active_rate, 25.0);

    let inactive: AccountQuery = from_value(json!({"lifecycleState": "inactive"})).unwrap();
    assert_eq!(service.list(&inactive).unwrap().meta.total, 3);
    assert_eq!(service.active_accounts().unwrap().len(), 1);
}

#[test]
fn batch_rejects_unknown_operation() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    let err = service
        .batch(&BatchRequest {
            ids: json!([1]),
            operation: "archive".to_string(),
            data: json!(null),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
