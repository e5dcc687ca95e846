use cardbook_core::db::open_db_in_memory;
use cardbook_core::{CompanyGroup, Person, RecordStore, SqliteRecordStore, StoreError};
use std::sync::{Arc, Mutex};

fn new_store() -> SqliteRecordStore {
    SqliteRecordStore::try_new(open_db_in_memory().unwrap()).unwrap()
}

#[test]
fn save_assigns_id_and_upserts_on_retry() {
    let store = new_store();
    let mut group = CompanyGroup::with_people("Acme", vec![Person::new("Alice")]);

    let id = store.save(&group).unwrap();
    group.id = Some(id.clone());
    group.people.push(Person::new("Bob"));
    assert_eq!(store.save(&group).unwrap(), id);
    assert_eq!(store.save(&group).unwrap(), id);

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(loaded[0].company, "Acme");
    let names: Vec<&str> = loaded[0].people.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
}

#[test]
fn person_keys_survive_a_reload() {
    let store = new_store();
    let group = CompanyGroup::with_people("Acme", vec![Person::new("Alice")]);
    let key = group.people[0].key;

    store.save(&group).unwrap();
    let loaded = store.load_all().unwrap();
    assert_eq!(loaded[0].people[0].key, key);
}

#[test]
fn empty_group_is_rejected() {
    let store = new_store();
    let err = store.save(&CompanyGroup::new("Ghost")).unwrap_err();
    assert!(matches!(err, StoreError::EmptyGroup(company) if company == "Ghost"));
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn delete_of_absent_id_is_a_no_op() {
    let store = new_store();
    let id = store
        .save(&CompanyGroup::with_people("Acme", vec![Person::new("Alice")]))
        .unwrap();

    store.delete("missing").unwrap();
    assert_eq!(store.load_all().unwrap().len(), 1);

    store.delete(&id).unwrap();
    store.delete(&id).unwrap();
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn load_all_keeps_creation_order() {
    let store = new_store();
    for company in ["Zeta", "Alpha", "Mid"] {
        store
            .save(&CompanyGroup::with_people(company, vec![Person::new("x")]))
            .unwrap();
    }

    let companies: Vec<String> = store
        .load_all()
        .unwrap()
        .into_iter()
        .map(|group| group.company)
        .collect();
    assert_eq!(companies, vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn subscribers_receive_current_list_and_every_change() {
    let store = new_store();
    store
        .save(&CompanyGroup::with_people("Acme", vec![Person::new("Alice")]))
        .unwrap();

    let pushes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pushes);
    let subscription = store
        .subscribe(Box::new(move |groups: &[CompanyGroup]| {
            sink.lock().unwrap().push(groups.len());
        }))
        .unwrap();

    let id = store
        .save(&CompanyGroup::with_people("Globex", vec![Person::new("Hank")]))
        .unwrap();
    store.delete(&id).unwrap();
    store.delete(&id).unwrap();
    assert_eq!(*pushes.lock().unwrap(), vec![1, 2, 1]);

    assert!(store.unsubscribe(subscription).unwrap());
    assert!(!store.unsubscribe(subscription).unwrap());
    store
        .save(&CompanyGroup::with_people("Initech", vec![Person::new("Bill")]))
        .unwrap();
    assert_eq!(pushes.lock().unwrap().len(), 3);
}

#[test]
fn undecodable_payload_becomes_placeholder() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO card_groups (id, payload) VALUES ('broken', 'U2FsdGVkX1+ciphertext');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO card_groups (id, payload) VALUES ('ok', '{\"company\":\"Acme\",\"people\":[{\"name\":\"Alice\",\"phones\":null}]}');",
        [],
    )
    .unwrap();
    let store = SqliteRecordStore::try_new(conn).unwrap();

    let loaded = store.load_all().unwrap();
    assert_eq!(loaded.len(), 2);
    let broken = loaded
        .iter()
        .find(|group| group.id.as_deref() == Some("broken"))
        .unwrap();
    assert!(broken.is_placeholder());
    assert!(broken.people.is_empty());

    let ok = loaded
        .iter()
        .find(|group| group.id.as_deref() == Some("ok"))
        .unwrap();
    assert!(!ok.is_placeholder());
    assert!(ok.people[0].phones.is_empty());
}

#[test]
fn concurrent_writers_push_snapshots_in_write_order() {
    let store = new_store();
    let pushes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pushes);
    store
        .subscribe(Box::new(move |groups: &[CompanyGroup]| {
            sink.lock().unwrap().push(groups.len());
        }))
        .unwrap();

    std::thread::scope(|scope| {
        for index in 0..16 {
            let store = &store;
            scope.spawn(move || {
                store
                    .save(&CompanyGroup::with_people(
                        format!("Company {index}"),
                        vec![Person::new(format!("Person {index}"))],
                    ))
                    .unwrap();
            });
        }
    });

    let pushes = pushes.lock().unwrap().clone();
    assert_eq!(pushes, (0..=16).collect::<Vec<usize>>());
    assert_eq!(*pushes.last().unwrap(), store.load_all().unwrap().len());
}
