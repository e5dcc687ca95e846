use cardbook_core::db::open_db_in_memory;
use cardbook_core::extraction::ensure_extraction_ready;
use cardbook_core::model::settings::DEFAULT_MODEL_NAME;
use cardbook_core::{
    ExtractionError, ExtractionSettings, SettingsError, SettingsRepository,
    SqliteSettingsRepository,
};

#[test]
fn unsaved_settings_load_as_defaults() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSettingsRepository::new(&conn);

    let settings = repo.load_extraction_settings().unwrap();
    assert_eq!(settings, ExtractionSettings::default());
    assert_eq!(settings.model_name, DEFAULT_MODEL_NAME);
    assert_eq!(
        ensure_extraction_ready(&settings),
        Err(ExtractionError::MissingApiKey)
    );
}

#[test]
fn saved_settings_are_normalized_and_overwritten() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSettingsRepository::new(&conn);

    repo.save_extraction_settings(&ExtractionSettings {
        api_key: " secret ".to_string(),
        model_name: " ".to_string(),
        demo_mode: false,
    })
    .unwrap();
    let loaded = repo.load_extraction_settings().unwrap();
    assert_eq!(loaded.api_key, "secret");
    assert_eq!(loaded.model_name, DEFAULT_MODEL_NAME);
    assert!(ensure_extraction_ready(&loaded).is_ok());

    repo.save_extraction_settings(&ExtractionSettings {
        demo_mode: true,
        ..ExtractionSettings::default()
    })
    .unwrap();
    let loaded = repo.load_extraction_settings().unwrap();
    assert!(loaded.demo_mode);
    assert!(!loaded.has_api_key());
    assert!(ensure_extraction_ready(&loaded).is_ok());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM settings;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn corrupt_settings_value_is_reported() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO settings (key, value) VALUES ('extraction', 'not json');",
        [],
    )
    .unwrap();
    let repo = SqliteSettingsRepository::new(&conn);

    assert!(matches!(
        repo.load_extraction_settings(),
        Err(SettingsError::InvalidData(_))
    ));
}
