mod common;

use akeeba_backup_api::{ConnectionOptions, Error, Verb, View, auth};
use common::{Reply, SECRET, api_options, connector, v1, v2};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn v1_options(verb: Verb) -> ConnectionOptions {
    ConnectionOptions::builder()
        .host("https://www.example.com/")
        .secret(SECRET)
        .verb(Some(verb))
        .view(Some(View::Json))
        .component("com_akeeba")
        .format("raw")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_status_mapping() {
    let connector = connector(api_options(), |seen| match seen.param("method") {
        Some("getVersion") => v2(503, json!("Invalid key")),
        Some("nonexistent") => v2(405, json!("Unknown method")),
        Some("startRestoration") => v2(501, json!("Gone")),
        _ => v2(404, json!("Nothing here")),
    });

    assert!(matches!(
        connector.do_query("getVersion", Value::Null).await,
        Err(Error::InvalidSecretWord)
    ));
    assert!(matches!(
        connector.do_query("nonexistent", Value::Null).await,
        Err(Error::UnknownMethod(method)) if method == "nonexistent"
    ));
    assert!(matches!(
        connector.do_query("startRestoration", Value::Null).await,
        Err(Error::NotImplemented(method)) if method == "startRestoration"
    ));

    // Any other status is for the caller to interpret
    let response = connector.do_query("getBackupInfo", Value::Null).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.message(), "Nothing here");
}

#[tokio::test]
async fn test_v1_envelope_round_trip() {
    let connector = connector(v1_options(Verb::Get), |seen| {
        assert_eq!(seen.method, http::Method::GET);
        assert_eq!(seen.param("view"), Some("json"));
        assert_eq!(seen.param("option"), Some("com_akeeba"));
        assert_eq!(seen.param("format"), Some("raw"));

        let envelope = seen.envelope().expect("v1 envelope");
        let challenge = envelope["challenge"].as_str().unwrap();
        let (salt, _) = challenge.split_once(':').unwrap();
        assert_eq!(salt.len(), auth::SALT_LENGTH);
        assert_eq!(challenge, auth::challenge_with_salt(salt, SECRET));

        let mut data = envelope["data"].clone();
        data["marker"] = json!("echoed");
        v1(200, data)
    });

    let response = connector
        .do_query("echo", json!({"backup_id": 12, "tags": ["a", "b"]}))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.data()["marker"], "echoed");
    assert_eq!(response.data()["backup_id"], 12);
    assert_eq!(response.data()["tags"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_v1_post_sends_form_body() {
    let connector = connector(v1_options(Verb::Post), |seen| {
        assert_eq!(seen.method, http::Method::POST);
        assert_eq!(seen.url.as_str(), "https://www.example.com/index.php");
        assert_eq!(seen.api_method().as_deref(), Some("getVersion"));
        v1(200, json!({"api": 340}))
    });

    let response = connector.information().await.unwrap();
    assert_eq!(response.data()["api"], 340);
}

#[tokio::test]
async fn test_v2_post_keeps_payload_out_of_the_url() {
    let connector = connector(api_options(), |seen| {
        assert_eq!(seen.method, http::Method::POST);
        assert_eq!(seen.url.query(), Some(format!("_akeebaAuth={SECRET}").as_str()));
        assert_eq!(seen.param("method"), Some("listBackups"));
        assert_eq!(seen.param("view"), Some("Api"));
        assert_eq!(seen.param("from"), Some("0"));
        assert_eq!(seen.param("limit"), Some("200"));
        assert_eq!(seen.param("option"), Some("com_akeebabackup"));
        assert_eq!(seen.param("format"), Some("json"));
        v2(200, json!([]))
    });

    assert!(connector.get_backups(-4, 5000).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_junk_wrapped_response() {
    let connector = connector(api_options(), |_| {
        Reply::Text(
            "<b>Deprecated</b>: something in plugin.php on line 12<br>\n\
             {\"status\":200,\"data\":{\"api\":340}}\n<!-- cache -->"
                .to_string(),
        )
    });

    let response = connector.information().await.unwrap();
    assert_eq!(response.data()["api"], 340);
}

#[tokio::test]
async fn test_marker_delimited_response() {
    let connector = connector(v1_options(Verb::Get), |_| {
        Reply::Text(r####"{"junk":1}###{"body":{"status":200,"data":"{\"api\":340}"}}###"####.to_string())
    });

    let response = connector.information().await.unwrap();
    assert_eq!(response.data()["api"], 340);
}

#[tokio::test]
async fn test_undecodable_responses() {
    let connector = connector(api_options(), |_| {
        Reply::Text("<html>Site offline</html>".to_string())
    });
    assert!(matches!(
        connector.information().await,
        Err(Error::InvalidEncapsulatedJSON(excerpt)) if excerpt.contains("Site offline")
    ));

    let connector = common::connector(v1_options(Verb::Get), |_| {
        Reply::Text(r#"{"body":{"status":200,"data":"not json"}}"#.to_string())
    });
    assert!(matches!(connector.information().await, Err(Error::InvalidJSONBody)));
}

#[tokio::test]
async fn test_transport_errors_pass_through() {
    let connector = connector(api_options(), |_| Reply::Fail(502, "Bad Gateway"));

    match connector.information().await {
        Err(Error::CommunicationError { code, message }) => {
            assert_eq!(code, 502);
            assert_eq!(message, "Bad Gateway");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let options = api_options()
        .modified_clone(akeeba_backup_api::OptionOverrides {
            user_agent: Some("BackupRobot/2.0".to_string()),
            ..Default::default()
        })
        .unwrap();

    let connector = connector(options, |seen| {
        assert_eq!(seen.user_agent.as_deref(), Some("BackupRobot/2.0"));
        v2(200, json!({"api": 340}))
    });

    connector.information().await.unwrap();
    assert_eq!(connector.transport().seen().len(), 1);
}

#[tokio::test]
async fn test_get_url_for_v2() {
    let options = api_options()
        .modified_clone(akeeba_backup_api::OptionOverrides {
            verb: Some("GET".to_string()),
            ..Default::default()
        })
        .unwrap();

    let connector = connector(options, |_| v2(200, json!({})));
    let url = connector
        .make_url("getBackupInfo", &json!({"backup_id": 3}), None)
        .unwrap();

    let parsed = url::Url::parse(&url).unwrap();
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

    assert_eq!(parsed.path(), "/index.php");
    assert!(pairs.contains(&("_akeebaAuth".to_string(), SECRET.to_string())));
    assert!(pairs.contains(&("backup_id".to_string(), "3".to_string())));
    assert!(pairs.contains(&("method".to_string(), "getBackupInfo".to_string())));
    assert!(pairs.contains(&("view".to_string(), "Api".to_string())));
}

/// Log output shared between the test and its subscriber
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_events_go_to_the_connection_logger() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let options = api_options()
        .modified_clone(akeeba_backup_api::OptionOverrides {
            verbose: Some(true),
            logger: Some(tracing::Dispatch::new(subscriber)),
            ..Default::default()
        })
        .unwrap();

    let mut connector = connector(options, |_| v2(200, json!({"api": 340})));
    connector.information().await.unwrap();

    let logged = logs.contents();
    assert!(logged.contains("<< Response"));
    assert!(logged.contains("getVersion"));

    // Swapping the options moves events to the new logger
    let quiet = connector
        .modified_options(akeeba_backup_api::OptionOverrides {
            logger: Some(tracing::Dispatch::none()),
            ..Default::default()
        })
        .unwrap();
    connector.set_options(quiet).unwrap();
    connector.information().await.unwrap();

    assert_eq!(logs.contents(), logged);
}
