use montylite::MontyClient;
use montylite::cli::{Command, OutputMode, run_with_writer};

fn run(client: &MontyClient, cmd: Command) -> Result<String, montylite::DbError> {
    let mut buf = Vec::new();
    run_with_writer(client, "clidb", cmd, OutputMode::Json, &mut buf)?;
    Ok(String::from_utf8(buf).unwrap())
}

fn insert(client: &MontyClient, json: &str) {
    run(client, Command::Insert { collection: "people".into(), docs_json: json.into(), ordered: true }).unwrap();
}

#[test]
fn update_reports_counts_and_upserts() {
    let client = MontyClient::memory();
    insert(&client, r#"[{"_id": 1, "age": 30}, {"_id": 2, "age": 40}]"#);
    let out = run(
        &client,
        Command::Update {
            collection: "people".into(),
            filter_json: r#"{"age": {"$gte": 30}}"#.into(),
            update_json: r#"{"$inc": {"age": 1}}"#.into(),
            many: true,
            upsert: false,
            array_filters: None,
        },
    )
    .unwrap();
    assert_eq!(out.trim(), r#"{"matched":2,"modified":2}"#);
    let out = run(
        &client,
        Command::Update {
            collection: "people".into(),
            filter_json: r#"{"_id": 9}"#.into(),
            update_json: r#"{"$set": {"age": 1}}"#.into(),
            many: false,
            upsert: true,
            array_filters: None,
        },
    )
    .unwrap();
    assert_eq!(out.trim(), r#"{"matched":0,"modified":0,"upserted_id":9}"#);
}

#[test]
fn find_with_sort_and_limit_prints_one_line_per_document() {
    let client = MontyClient::memory();
    insert(&client, r#"[{"_id": 1, "n": "b"}, {"_id": 2, "n": "a"}, {"_id": 3, "n": "c"}]"#);
    let out = run(
        &client,
        Command::Find {
            collection: "people".into(),
            filter_json: "{}".into(),
            projection: Some(r#"{"_id": 0}"#.into()),
            sort: Some(r#"{"n": -1}"#.into()),
            skip: 0,
            limit: 2,
            max_time_ms: None,
        },
    )
    .unwrap();
    assert_eq!(out.lines().collect::<Vec<_>>(), vec![r#"{"n":"c"}"#, r#"{"n":"b"}"#]);
}

#[test]
fn distinct_delete_and_drop() {
    let client = MontyClient::memory();
    insert(&client, r#"[{"t": ["x", "y"]}, {"t": "x"}]"#);
    let out = run(
        &client,
        Command::Distinct { collection: "people".into(), key: "t".into(), filter_json: "{}".into() },
    )
    .unwrap();
    assert_eq!(out.trim(), r#"["x","y"]"#);
    let out = run(&client, Command::Delete { collection: "people".into(), filter_json: r#"{"t": "x"}"#.into(), many: true })
        .unwrap();
    assert_eq!(out.trim(), "2");
    let out = run(&client, Command::Drop { collection: "people".into() }).unwrap();
    assert_eq!(out.trim(), r#"{"dropped":true}"#);
}

#[test]
fn malformed_json_is_an_error() {
    let client = MontyClient::memory();
    let err = run(&client, Command::Count { collection: "people".into(), filter_json: "{not json".into() }).unwrap_err();
    assert!(matches!(err, montylite::DbError::Json(_)));
    let err = run(&client, Command::Count { collection: "people".into(), filter_json: "[]".into() }).unwrap_err();
    assert!(matches!(err, montylite::DbError::InvalidDocument(_)));
}

#[test]
fn metrics_command_prints_exposition_text() {
    let client = MontyClient::memory();
    let out = run(&client, Command::Metrics).unwrap();
    assert!(out.contains("montylite_queries_total"));
}
