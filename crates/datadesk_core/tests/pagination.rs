use datadesk_core::model::account::NewAccount;
use datadesk_core::repo::account_repo::AccountRepository;
use datadesk_core::validation::account::AccountQuery;
use datadesk_core::{
    open_db_in_memory, AccountService, ErrorKind, LifecycleState, OrderDirection, PageRequest,
    RepoError,
};
use rusqlite::Connection;
use serde_json::{from_value, json};

fn seed(conn: &Connection, handles: &[String]) {
    let repo = AccountRepository::new(conn);
    for handle in handles {
        repo.create(&NewAccount {
            handle: handle.clone(),
            contact_address: None,
            avatar_reference: None,
            lifecycle_state: LifecycleState::Active,
        })
        .unwrap();
    }
}

fn numbered(count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("user_{index:02}")).collect()
}

#[test]
fn twenty_five_rows_split_into_three_pages() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &numbered(25));
    let repo = AccountRepository::new(&conn);

    let third = repo.search(&PageRequest::new(3, 10), None).unwrap();
    assert_eq!(third.rows.len(), 5);
    assert_eq!(third.meta.total, 25);
    assert_eq!(third.meta.total_pages, 3);
    assert!(!third.meta.has_next);
    assert!(third.meta.has_prev);

    let first = repo.search(&PageRequest::new(1, 10), None).unwrap();
    assert!(first.meta.has_next);
    assert!(!first.meta.has_prev);

    let beyond = repo.search(&PageRequest::new(4, 10), None).unwrap();
    assert!(beyond.rows.is_empty());
    assert_eq!(beyond.meta.total, 25);
}

#[test]
fn limit_is_clamped_and_defaults_apply() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &numbered(12));
    let repo = AccountRepository::new(&conn);

    let defaulted = repo.search(&PageRequest::default(), None).unwrap();
    assert_eq!(defaulted.meta.page, 1);
    assert_eq!(defaulted.meta.limit, 10);
    assert_eq!(defaulted.rows.len(), 10);

    let clamped = repo.search(&PageRequest::new(0, 500), None).unwrap();
    assert_eq!(clamped.meta.page, 1);
    assert_eq!(clamped.meta.limit, 100);
    assert_eq!(clamped.rows.len(), 12);
}

#[test]
fn ordering_uses_allow_listed_fields() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &["bravo".to_string(), "alpha".to_string(), "charlie".to_string()]);
    let repo = AccountRepository::new(&conn);

    let request = PageRequest {
        order_by: Some("handle".to_string()),
        order_direction: Some(OrderDirection::Asc),
        ..PageRequest::default()
    };
    let page = repo.search(&request, None).unwrap();
    let handles: Vec<&str> = page.rows.iter().map(|row| row.handle.as_str()).collect();
    assert_eq!(handles, vec!["alpha", "bravo", "charlie"]);

    let hostile = PageRequest {
        order_by: Some("handle; DROP TABLE accounts".to_string()),
        ..PageRequest::default()
    };
    match repo.search(&hostile, None).unwrap_err() {
        RepoError::UnknownColumn(name) => assert!(name.starts_with("handle;")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_order_column_surfaces_as_validation() {
    let conn = open_db_in_memory().unwrap();
    let service = AccountService::new(&conn);

    let query: AccountQuery = from_value(json!({"orderBy": "password"})).unwrap();
    let err = service.list(&query).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn search_treats_wildcards_literally() {
    let conn = open_db_in_memory().unwrap();
    seed(
        &conn,
        &["ab_cd".to_string(), "abxcd".to_string(), "pct_100".to_string()],
    );
    let repo = AccountRepository::new(&conn);

    let underscore = repo
        .search(&PageRequest::default().with_search("b_c"), None)
        .unwrap();
    assert_eq!(underscore.meta.total, 1);
    assert_eq!(underscore.rows[0].handle, "ab_cd");

    let percent = repo
        .search(&PageRequest::default().with_search("%"), None)
        .unwrap();
    assert_eq!(percent.meta.total, 0);

    let blank = repo
        .search(&PageRequest::default().with_search("   "), None)
        .unwrap();
    assert_eq!(blank.meta.total, 3);
}
