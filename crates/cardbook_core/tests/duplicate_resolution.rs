use cardbook_core::db::open_db_in_memory;
use cardbook_core::merge::{merge_clean, partition};
use cardbook_core::{
    scan_for_duplicates, CompanyGroup, DuplicateAction, DuplicateResolver, FeedCallback, GroupId,
    Person, RecordStore, ResolverError, SqliteRecordStore, StoreError, StoreResult,
    SubscriptionId, WorkingSet,
};
use std::sync::Mutex;

fn new_store() -> SqliteRecordStore {
    SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

/// Persists `groups` and returns a working set mirroring the stored ids.
fn seeded(store: &dyn RecordStore, groups: Vec<CompanyGroup>) -> WorkingSet {
    let mut working = WorkingSet::new();
    merge_clean(groups, &mut working, store).unwrap();
    working
}

/// Store double that records calls and refuses saves for one company.
struct FlakyStore {
    inner: SqliteRecordStore,
    failing_company: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl FlakyStore {
    fn new(failing_company: &str) -> Self {
        Self {
            inner: new_store(),
            failing_company: Mutex::new(Some(failing_company.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn heal(&self) {
        *self.failing_company.lock().unwrap() = None;
    }

    fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl RecordStore for FlakyStore {
    fn save(&self, group: &CompanyGroup) -> StoreResult<GroupId> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("save:{}", group.company));
        if self.failing_company.lock().unwrap().as_deref() == Some(group.company.as_str()) {
            return Err(StoreError::Rejected("network unavailable".to_string()));
        }
        self.inner.save(group)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.calls.lock().unwrap().push(format!("delete:{id}"));
        self.inner.delete(id)
    }

    fn load_all(&self) -> StoreResult<Vec<CompanyGroup>> {
        self.inner.load_all()
    }

    fn subscribe(&self, callback: FeedCallback) -> StoreResult<SubscriptionId> {
        self.inner.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<bool> {
        self.inner.unsubscribe(id)
    }
}

#[test]
fn merging_scanned_duplicate_unions_phones_in_order() {
    let store = new_store();
    let mut working = seeded(
        &store,
        vec![CompanyGroup::with_people(
            "Acme",
            vec![Person::new("Alice").with_phones(["111"])],
        )],
    );
    let split = partition(
        vec![CompanyGroup::with_people(
            "Acme",
            vec![
                Person::new("Alice").with_phones(["222", "111"]),
                Person::new("Bob"),
            ],
        )],
        &working,
    );
    merge_clean(split.clean_data, &mut working, &store).unwrap();

    let mut resolver = DuplicateResolver::new();
    assert_eq!(resolver.open(split.duplicates, &working).unwrap(), 1);
    resolver
        .resolve_one(0, DuplicateAction::Merge, &mut working)
        .unwrap();
    let report = resolver.commit(&mut working, &store).unwrap();

    assert!(report.is_complete());
    assert!(!resolver.is_reviewing());
    let acme = working.find_company("Acme").unwrap();
    assert_eq!(acme.people.len(), 2);
    assert_eq!(acme.people[0].phones, vec!["111".to_string(), "222".to_string()]);

    let stored = store.load_all().unwrap();
    assert_eq!(stored[0].people[0].phones, acme.people[0].phones);
}

#[test]
fn discarding_scanned_duplicate_changes_nothing() {
    let store = new_store();
    let mut working = seeded(
        &store,
        vec![CompanyGroup::with_people(
            "Acme",
            vec![Person::new("Alice").with_phones(["111"])],
        )],
    );
    let before = working.snapshot();
    let split = partition(
        vec![CompanyGroup::with_people(
            "Acme",
            vec![Person::new("Alice").with_phones(["222"])],
        )],
        &working,
    );

    let mut resolver = DuplicateResolver::new();
    resolver.open(split.duplicates, &working).unwrap();
    resolver
        .resolve_one(0, DuplicateAction::Discard, &mut working)
        .unwrap();
    assert!(resolver.modified_groups().is_empty());

    let report = resolver.commit(&mut working, &store).unwrap();
    assert!(report.saved.is_empty() && report.deleted.is_empty());
    assert_eq!(working.groups(), before.as_slice());
}

#[test]
fn cross_company_merge_deletes_emptied_group() {
    let store = new_store();
    let mut working = seeded(
        &store,
        vec![
            CompanyGroup::with_people("A", vec![Person::new("Carl").with_phones(["1"])]),
            CompanyGroup::with_people("B", vec![Person::new("Carl").with_phones(["2"])]),
        ],
    );

    let duplicates = scan_for_duplicates(&working);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].display_company_a, "A");
    assert_eq!(duplicates[0].display_company_b, "B");

    let mut resolver = DuplicateResolver::new();
    resolver.open(duplicates, &working).unwrap();
    resolver
        .resolve_one(0, DuplicateAction::Merge, &mut working)
        .unwrap();
    assert_eq!(resolver.modified_groups().len(), 2);

    let report = resolver.commit(&mut working, &store).unwrap();
    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.deleted.len(), 1);

    assert_eq!(working.len(), 1);
    assert_eq!(working.groups()[0].company, "A");
    assert_eq!(
        working.groups()[0].people[0].phones,
        vec!["1".to_string(), "2".to_string()]
    );
    let stored = store.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].company, "A");
}

#[test]
fn same_company_repeat_removes_only_the_incoming_occurrence() {
    let store = new_store();
    let mut working = WorkingSet::from_groups(vec![CompanyGroup::with_people(
        "Acme",
        vec![
            Person::new("Dana").with_phones(["1"]),
            Person::new("Eve"),
            Person::new("dana").with_phones(["2"]),
        ],
    )]);
    let anchor = working.groups()[0].people[0].key;

    let mut resolver = DuplicateResolver::new();
    resolver
        .open(scan_for_duplicates(&working), &working)
        .unwrap();
    resolver
        .resolve_one(0, DuplicateAction::Discard, &mut working)
        .unwrap();
    resolver.commit(&mut working, &store).unwrap();

    let acme = &working.groups()[0];
    assert_eq!(acme.people.len(), 2);
    assert_eq!(acme.people[0].key, anchor);
    assert_eq!(acme.people[0].phones, vec!["1".to_string()]);
    assert_eq!(acme.people[1].name, "Eve");
}

#[test]
fn cancel_restores_working_set_exactly() {
    let store = new_store();
    let mut working = seeded(
        &store,
        vec![
            CompanyGroup::with_people("A", vec![Person::new("Carl"), Person::new("Dana")]),
            CompanyGroup::with_people("B", vec![Person::new("carl")]),
            CompanyGroup::with_people("C", vec![Person::new("DANA"), Person::new("Carl")]),
        ],
    );
    let before = working.snapshot();

    let mut resolver = DuplicateResolver::new();
    let opened = resolver
        .open(scan_for_duplicates(&working), &working)
        .unwrap();
    assert_eq!(opened, 3);
    resolver
        .resolve_one(0, DuplicateAction::Merge, &mut working)
        .unwrap();
    resolver
        .resolve_one(2, DuplicateAction::Discard, &mut working)
        .unwrap();
    assert_ne!(working.groups(), before.as_slice());

    resolver.cancel(&mut working).unwrap();
    assert!(!resolver.is_reviewing());
    assert_eq!(working.groups(), before.as_slice());
    assert_eq!(store.load_all().unwrap().len(), 3);
}

#[test]
fn partial_commit_failure_keeps_session_open_for_retry() {
    let store = FlakyStore::new("B");
    let mut working = seeded(
        &store.inner,
        vec![
            CompanyGroup::with_people("A", vec![Person::new("Carl")]),
            CompanyGroup::with_people("B", vec![Person::new("Dana"), Person::new("Carl")]),
            CompanyGroup::with_people("C", vec![Person::new("Eve"), Person::new("dana")]),
        ],
    );

    let mut resolver = DuplicateResolver::new();
    resolver
        .open(scan_for_duplicates(&working), &working)
        .unwrap();
    let pending: Vec<usize> = resolver.pending().map(|(index, _)| index).collect();
    for index in pending {
        resolver
            .resolve_one(index, DuplicateAction::Merge, &mut working)
            .unwrap();
    }

    let report = resolver.commit(&mut working, &store).unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].company, "B");
    assert!(report.summary().contains("B"));
    assert!(resolver.is_reviewing());
    assert_eq!(resolver.modified_groups(), vec![report.failures[0].group]);
    assert_eq!(
        store.calls(),
        vec!["save:A".to_string(), "save:B".to_string(), "save:C".to_string()]
    );

    store.heal();
    let retry = resolver.commit(&mut working, &store).unwrap();
    assert!(retry.is_complete());
    assert_eq!(retry.saved.len(), 1);
    assert!(!resolver.is_reviewing());
    assert_eq!(
        resolver.cancel(&mut working),
        Err(ResolverError::NoSession)
    );
}

#[test]
fn unsaved_empty_group_is_dropped_without_remote_delete() {
    let store = FlakyStore::new("none");
    let mut working = WorkingSet::from_groups(vec![
        CompanyGroup::with_people("A", vec![Person::new("Carl")]),
        CompanyGroup::with_people("B", vec![Person::new("Carl")]),
    ]);

    let mut resolver = DuplicateResolver::new();
    resolver
        .open(scan_for_duplicates(&working), &working)
        .unwrap();
    resolver
        .resolve_one(0, DuplicateAction::Discard, &mut working)
        .unwrap();
    let report = resolver.commit(&mut working, &store).unwrap();

    assert_eq!(report.deleted.len(), 1);
    assert_eq!(working.len(), 1);
    assert!(store
        .calls()
        .iter()
        .all(|call| !call.starts_with("delete:")));
}
