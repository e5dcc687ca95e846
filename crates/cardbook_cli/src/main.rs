//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `cardbook_core` linkage with deterministic output.
//! - `demo [db_path]` switches the stored settings to demo mode and runs a
//!   scan import twice against a SQLite database (in-memory when no path is
//!   given) to exercise merge and review.
//! - Logs go to `CARDBOOK_LOG_DIR` when it is set.

use cardbook_core::db::{open_db, open_db_in_memory};
use cardbook_core::extraction::ensure_extraction_ready;
use cardbook_core::{
    CardBookService, DemoExtractor, DuplicateAction, RecordStore, SettingsRepository,
    SqliteRecordStore, SqliteSettingsRepository,
};
use log::info;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("cardbook_core ping={}", cardbook_core::ping());
    println!("cardbook_core version={}", cardbook_core::core_version());

    if let Ok(log_dir) = std::env::var("CARDBOOK_LOG_DIR") {
        if let Err(message) =
            cardbook_core::init_logging(cardbook_core::default_log_level(), &log_dir)
        {
            eprintln!("logging disabled: {message}");
        }
    }

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => ExitCode::SUCCESS,
        Some("demo") => match run_demo(args.next()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("demo failed: {message}");
                ExitCode::FAILURE
            }
        },
        Some(other) => {
            eprintln!("unknown command `{other}`; expected `demo [db_path]`");
            ExitCode::from(2)
        }
    }
}

fn run_demo(db_path: Option<String>) -> Result<(), String> {
    let conn = match db_path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let settings_repo = SqliteSettingsRepository::new(&conn);
    let mut settings = settings_repo
        .load_extraction_settings()
        .map_err(|err| err.to_string())?;
    if !settings.demo_mode {
        settings.demo_mode = true;
        settings_repo
            .save_extraction_settings(&settings)
            .map_err(|err| err.to_string())?;
    }
    ensure_extraction_ready(&settings).map_err(|err| err.to_string())?;
    println!("settings model={} demo_mode={}", settings.model_name, settings.demo_mode);

    let store: Arc<dyn RecordStore> =
        Arc::new(SqliteRecordStore::try_new(conn).map_err(|err| err.to_string())?);
    let mut book = CardBookService::new(store).map_err(|err| err.to_string())?;

    // The second pass collides with every card from the first one.
    for pass in 1..=2 {
        let outcome = book
            .import_scan(&["data:image/jpeg;base64,ZGVtbw=="], &DemoExtractor)
            .map_err(|err| err.to_string())?;
        println!(
            "scan pass={} groups={} merged={} duplicates={}",
            pass, outcome.groups_extracted, outcome.people_merged, outcome.duplicates
        );

        let pending: Vec<usize> = book.resolver().pending().map(|(index, _)| index).collect();
        for index in pending {
            book.resolve_duplicate(index, DuplicateAction::Merge)
                .map_err(|err| err.to_string())?;
        }
        if book.is_reviewing() {
            let report = book.commit_resolution().map_err(|err| err.to_string())?;
            println!("review {}", report.summary());
        }
    }

    for group in book.groups() {
        println!("company={} people={}", group.company, group.people.len());
    }
    info!(
        "event=cli_demo module=cli status=ok groups={} people={}",
        book.groups().len(),
        book.working_set().person_count()
    );
    Ok(())
}
