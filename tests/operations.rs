mod common;

use akeeba_backup_api::{BackupOptions, Error, Stability};
use common::{api_options, connector, v2};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_backup_steps_until_done() {
    let steps = Arc::new(AtomicUsize::new(0));
    let counter = steps.clone();

    let connector = connector(api_options(), move |seen| match seen.param("method") {
        Some("startBackup") => {
            assert_eq!(seen.param("profile"), Some("2"));
            assert_eq!(seen.param("description"), Some("Remote backup"));
            v2(200, json!({"HasRun": 1, "BackupID": 12, "backupid": "id-9"}))
        }
        Some("stepBackup") => {
            assert_eq!(seen.param("backupid"), Some("id-9"));
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => v2(200, json!({"HasRun": 1, "Progress": 50})),
                _ => v2(200, json!({"HasRun": 0, "Progress": 100, "Archive": "site-20261017.jpa"})),
            }
        }
        _ => v2(404, json!("Unexpected call")),
    });

    let mut reports = Vec::new();
    let result = connector
        .backup(&BackupOptions::with_profile(2), |data| reports.push(data.clone()))
        .await
        .unwrap();

    assert_eq!(result.id, 12);
    assert_eq!(result.archive, "site-20261017.jpa");
    assert_eq!(steps.load(Ordering::SeqCst), 2);
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.last().unwrap()["Progress"], 100);
}

#[tokio::test]
async fn test_backup_failure_is_reported() {
    let connector = connector(api_options(), |seen| match seen.param("method") {
        Some("startBackup") => v2(200, json!({"HasRun": 1, "backupid": "id-1"})),
        _ => v2(500, json!("Disk quota exceeded")),
    });

    let error = connector
        .backup(&BackupOptions::default(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        Error::RemoteError { status: 500, ref message } if message == "Disk quota exceeded"
    ));
}

#[tokio::test]
async fn test_list_backups() {
    let connector = connector(api_options(), |seen| {
        assert_eq!(seen.param("from"), Some("10"));
        assert_eq!(seen.param("limit"), Some("1"));
        v2(200, json!({"0": {"id": 3}}))
    });

    let records = connector.get_backups(10, 0).await.unwrap();
    assert_eq!(records, vec![json!({"id": 3})]);

    let connector = common::connector(api_options(), |_| v2(500, json!("Database error")));
    assert!(matches!(
        connector.get_backups(0, 50).await,
        Err(Error::CannotListBackupRecords)
    ));
}

#[tokio::test]
async fn test_delete_statuses() {
    let connector = connector(api_options(), |seen| match seen.param("backup_id") {
        Some("1") => v2(200, json!(true)),
        Some("2") => v2(404, json!("No such record")),
        _ => v2(500, json!("Cannot delete")),
    });

    connector.delete(1).await.unwrap();
    assert!(matches!(connector.delete(2).await, Err(Error::NoSuchBackupRecord)));
    assert!(matches!(connector.delete(3).await, Err(Error::CannotDeleteRecord(3))));
    assert!(matches!(connector.delete_files(3).await, Err(Error::CannotDeleteFiles(3))));

    // Invalid IDs never reach the server
    let before = connector.transport().seen().len();
    assert!(matches!(connector.delete(0).await, Err(Error::NoBackupID)));
    assert!(matches!(connector.delete_files(-1).await, Err(Error::NoBackupID)));
    assert_eq!(connector.transport().seen().len(), before);
}

#[tokio::test]
async fn test_profiles() {
    let connector = connector(api_options(), |seen| match seen.param("method") {
        Some("getProfiles") => v2(200, json!([{"id": 1, "name": "Default"}])),
        Some("importConfiguration") => {
            assert_eq!(seen.param("profile"), Some("0"));
            assert_eq!(seen.param("data[description]"), Some("Imported"));
            v2(200, json!({"id": 4}))
        }
        Some("exportConfiguration") => {
            assert_eq!(seen.param("profile"), Some("4"));
            v2(200, json!({"description": "Imported"}))
        }
        _ => v2(404, json!("Unexpected call")),
    });

    let profiles = connector.get_profiles().await.unwrap();
    assert_eq!(profiles[0]["name"], "Default");

    let imported = connector
        .import_configuration(r#"{"description": "Imported"}"#)
        .await
        .unwrap();
    assert_eq!(imported["id"], 4);

    let exported = connector.export_configuration(4).await.unwrap();
    assert_eq!(exported["description"], "Imported");

    assert!(matches!(connector.import_configuration("  ").await, Err(Error::NoProfileData)));
    assert!(matches!(connector.import_configuration("{broken").await, Err(Error::NoProfileData)));
    assert!(matches!(connector.export_configuration(0).await, Err(Error::NoProfileID)));
}

#[tokio::test]
async fn test_profiles_failure() {
    let connector = connector(api_options(), |_| v2(500, json!("Nope")));
    assert!(matches!(connector.get_profiles().await, Err(Error::CannotListProfiles)));
}

fn update_info(overrides: Value) -> Value {
    let mut info = json!({
        "supported": 1,
        "stuck": 0,
        "hasUpdates": 1,
        "version": "9.9.1",
        "stability": "stable",
    });

    for (key, value) in overrides.as_object().unwrap() {
        info[key] = value.clone();
    }

    info
}

#[tokio::test]
async fn test_update_information() {
    let connector = connector(api_options(), |seen| {
        assert_eq!(seen.param("force"), Some("1"));
        v2(200, update_info(json!({})))
    });

    let info = connector.get_update_information(true).await.unwrap();
    assert_eq!(info.version, "9.9.1");
    assert_eq!(info.stability, Some(Stability::Stable));
    assert!(info.check_stability(Stability::Rc).is_ok());
}

#[tokio::test]
async fn test_update_information_failures() {
    let cases = [
        (json!({"supported": 0}), "support"),
        (json!({"stuck": 1}), "stuck"),
        (json!({"hasUpdates": 0}), "none"),
    ];

    for (overrides, case) in cases {
        let info = update_info(overrides);
        let connector = connector(api_options(), move |_| v2(200, info.clone()));

        let error = connector.get_update_information(false).await.unwrap_err();
        match (case, error) {
            ("support", Error::LiveUpdateSupport) | ("none", Error::NoUpdates) => {}
            ("stuck", Error::LiveUpdateStuck(hint)) => assert!(hint.contains("--force=1")),
            (case, error) => panic!("{case}: unexpected error {error:?}"),
        }
    }

    let connector = connector(api_options(), |_| v2(500, json!("Broken")));
    assert!(matches!(
        connector.get_update_information(false).await,
        Err(Error::CannotGetUpdateInformation)
    ));
}

#[tokio::test]
async fn test_update_steps() {
    let connector = connector(api_options(), |seen| match seen.param("method") {
        Some("updateDownload") | Some("updateExtract") => v2(200, json!(true)),
        _ => v2(500, json!("Permission denied")),
    });

    connector.download_update().await.unwrap();
    connector.extract_update().await.unwrap();

    assert!(matches!(
        connector.install_update().await,
        Err(Error::LiveUpdateInstallError(message)) if message == "Permission denied"
    ));
    assert!(matches!(
        connector.cleanup_update().await,
        Err(Error::LiveUpdateCleanupError(_))
    ));
}
