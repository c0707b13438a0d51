use assert_cmd::{cargo, prelude::*};
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const FIXTURE_PAGE: &str = "tests/fixtures/ajustes.html";

fn setup_temp_home() -> TempDir {
    TempDir::new().expect("failed to create temp home")
}

fn b3futures(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("b3futures"));
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("B3FUTURES_DB")
        .arg("--no-color");
    cmd
}

fn collect_fixture(home: &TempDir, db: &PathBuf) {
    b3futures(home)
        .arg("--db")
        .arg(db)
        .arg("collect")
        .arg("--html-file")
        .arg(FIXTURE_PAGE)
        .assert()
        .success()
        .stdout(predicate::str::contains("Appended 7 rows"));
}

#[test]
fn collect_uses_default_store_under_home() {
    let home = setup_temp_home();
    let default_db = home.path().join(".b3futures").join("b3_futures.db");

    b3futures(&home)
        .arg("collect")
        .arg("--html-file")
        .arg(FIXTURE_PAGE)
        .assert()
        .success()
        .stdout(predicate::str::contains("DI1 - 1-day Interbank Deposits"))
        .stdout(predicate::str::contains("\u{001b}[").not());

    assert!(default_db.exists(), "collect should create the default store");
}

#[test]
fn collect_dry_run_does_not_create_db() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("collect")
        .arg("--html-file")
        .arg(FIXTURE_PAGE)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 7 contracts"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(!db.exists(), "dry-run should not create db");
}

#[test]
fn collect_then_latest_and_history() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    collect_fixture(&home, &db);

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains("J27"))
        .stdout(predicate::str::contains("87,046.15"))
        .stdout(predicate::str::contains("(7 rows)"));

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("history")
        .arg("dol")
        .assert()
        .success()
        .stdout(predicate::str::contains("5,401.904"))
        .stdout(predicate::str::contains("(1 rows)"));
}

#[test]
fn env_var_selects_store() {
    let home = setup_temp_home();
    let db = home.path().join("from_env.db");
    collect_fixture(&home, &db);

    b3futures(&home)
        .env("B3FUTURES_DB", &db)
        .arg("commodities")
        .assert()
        .success()
        .stdout(predicate::str::contains("BGI - Live Cattle"))
        .stdout(predicate::str::contains("WIN - Mini Bovespa Index"));
}

#[test]
fn query_outputs_json() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    collect_fixture(&home, &db);

    let output = b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("--json")
        .arg("query")
        .arg("SELECT Contract_Month, Current_Price FROM all_futures WHERE Commodity LIKE 'DI1%' ORDER BY Contract_Month")
        .output()
        .expect("run query");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["columns"], serde_json::json!(["Contract_Month", "Current_Price"]));
    assert_eq!(value["rows"].as_array().unwrap().len(), 3);
    assert_eq!(value["rows"][0][0], "F26");
}

#[test]
fn extract_writes_csv_with_schema_header() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    let csv_path = home.path().join("extract.csv");
    collect_fixture(&home, &db);

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("extract")
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 7 rows"));

    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with(
        "Commodity,Contract_Month,Previous_Price,Current_Price,Variation,Settlement_Value,download_date,download_time"
    ));
    assert_eq!(text.lines().count(), 8);
}

#[test]
fn write_through_query_is_rejected() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    collect_fixture(&home, &db);

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("query")
        .arg("DELETE FROM all_futures")
        .assert()
        .failure();

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("batches")
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn analyze_without_saving() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    let out_dir = home.path().join("charts");
    collect_fixture(&home, &db);

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("analyze")
        .arg("--no-save")
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("price_trends"))
        .stdout(predicate::str::contains("dashboard"));

    assert!(!out_dir.exists());
}

#[test]
fn analyze_saves_html_and_index() {
    let home = setup_temp_home();
    let db = home.path().join("futures.db");
    let out_dir = home.path().join("charts");
    collect_fixture(&home, &db);

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("analyze")
        .arg("--commodity")
        .arg("DI1")
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success();

    let index = std::fs::read_to_string(out_dir.join("index.html")).unwrap();
    assert!(index.contains("price_trends_"));
    let html_files = std::fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "html"))
        .count();
    assert!(html_files >= 5);
}

#[test]
fn missing_store_exits_non_zero() {
    let home = setup_temp_home();
    let db = home.path().join("missing.db");

    b3futures(&home)
        .arg("--db")
        .arg(&db)
        .arg("latest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("store not found"));

    // The failure is reported once, not logged and then printed again
    let output = b3futures(&home).arg("--db").arg(&db).arg("latest").output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("store not found").count(), 1);

    assert!(!db.exists());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let home = setup_temp_home();

    b3futures(&home)
        .arg("--config")
        .arg(home.path().join("nope.toml"))
        .arg("batches")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn config_file_sets_store_and_output_dir() {
    let home = setup_temp_home();
    let db = home.path().join("configured.db");
    let config = home.path().join("config.toml");
    std::fs::write(
        &config,
        format!("db_path = {:?}\noutput_dir = {:?}\n", db, home.path().join("out")),
    )
    .unwrap();

    b3futures(&home)
        .arg("--config")
        .arg(&config)
        .arg("collect")
        .arg("--html-file")
        .arg(FIXTURE_PAGE)
        .assert()
        .success();
    assert!(db.exists());

    b3futures(&home)
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .assert()
        .success();
    assert!(home.path().join("out").join("index.html").exists());
}
