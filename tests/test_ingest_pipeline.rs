//! End-to-end ingestion runs against a scripted upstream and a real SQLite
//! warehouse
//!
//! Covers:
//! - First load into an empty table
//! - Overlap re-fetch overwriting a corrected value
//! - Blank / null / unknown fields landing as nulls
//! - Retry recovery and give-up through the public client
//! - File-backed warehouse reopened between runs

#[cfg(test)]
mod ingest_pipeline_tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use genmix::ingest::backoff::Sleeper;
    use genmix::ingest::client::{DatastoreResponse, TransportError};
    use genmix::ingest::{
        run_ingestion, DatabaseConfig, IngestError, IngestionStats, NesoClient, RawRecord,
        RunOptions, SqliteStore, Transport, WarehouseStore,
    };
    use serde_json::{json, Value};

    struct FakeUpstream {
        script: Mutex<VecDeque<Result<DatastoreResponse, TransportError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeUpstream {
        fn new(script: Vec<Result<DatastoreResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn with_pages(pages: Vec<Vec<RawRecord>>) -> Self {
            Self::new(
                pages
                    .into_iter()
                    .map(|p| Ok(DatastoreResponse::from_records(p)))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl Transport for FakeUpstream {
        async fn search_sql(&self, sql: &str) -> Result<DatastoreResponse, TransportError> {
            self.queries.lock().unwrap().push(sql.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(DatastoreResponse::default()))
        }
    }

    #[derive(Default)]
    struct InstantSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for InstantSleeper {
        async fn sleep(&self, delay: Duration) {
            self.slept.lock().unwrap().push(delay);
        }
    }

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("records must be JSON objects"),
        }
    }

    fn client(upstream: FakeUpstream) -> NesoClient<FakeUpstream, InstantSleeper> {
        NesoClient::new(upstream, InstantSleeper::default(), "generation-mix")
    }

    fn memory_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 10, 20, 0).unwrap()
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_load_into_empty_table() {
        let mut store = memory_store();
        let upstream = FakeUpstream::with_pages(vec![vec![
            raw(json!({"DATETIME": "2024-01-02T06:00:00Z", "GAS": 100.0, "WIND": "55.5", "CARBON_INTENSITY": 180})),
            raw(json!({"DATETIME": "2024-01-02T07:00:00Z", "GAS": 110.0, "NUCLEAR": 4000})),
        ]]);
        let client = client(upstream);

        let stats = run_ingestion(&RunOptions::default(), &client, &mut store, now())
            .await
            .unwrap();

        assert_eq!(stats, IngestionStats { fetched: 2, upserted: 2 });

        let rows = store.rows_between(t(0), t(23)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].datetime_utc, t(6));
        assert_eq!(rows[0].get("gas_mw"), Some(100.0));
        assert_eq!(rows[0].get("wind_mw"), Some(55.5));
        assert_eq!(rows[0].get("carbon_intensity_gco2_kwh"), Some(180.0));
        assert_eq!(rows[0].get("nuclear_mw"), None);
        assert_eq!(rows[1].datetime_utc, t(7));
        assert_eq!(rows[1].get("nuclear_mw"), Some(4000.0));
        assert_eq!(store.latest_timestamp().unwrap(), Some(t(7)));

        // Empty table: no clamp, window starts 3 days before the aligned hour
        let queries = client_queries(client.transport());
        assert!(queries[0].contains(">= '2023-12-31T10:00:00Z'"));
        assert!(queries[0].contains("< '2024-01-03T10:30:00Z'"));
    }

    #[tokio::test]
    async fn test_overlap_rerun_overwrites_correction() {
        let mut store = memory_store();
        let first = client(FakeUpstream::with_pages(vec![vec![raw(
            json!({"DATETIME": "2024-01-02T06:00:00Z", "GAS": 100}),
        )]]));
        run_ingestion(&RunOptions::default(), &first, &mut store, now())
            .await
            .unwrap();

        let second = client(FakeUpstream::with_pages(vec![vec![raw(
            json!({"DATETIME": "2024-01-02T06:00:00Z", "GAS": 150}),
        )]]));
        let options = RunOptions {
            overlap_hours: 48,
            ..Default::default()
        };
        let stats = run_ingestion(&options, &second, &mut store, now()).await.unwrap();

        assert_eq!(stats, IngestionStats { fetched: 1, upserted: 1 });
        assert_eq!(store.row_count().unwrap(), 1);
        let rows = store.rows_between(t(0), t(23)).unwrap();
        assert_eq!(rows[0].get("gas_mw"), Some(150.0));
    }

    #[tokio::test]
    async fn test_blank_null_and_unknown_fields_store_nulls() {
        let mut store = memory_store();
        let client = client(FakeUpstream::with_pages(vec![vec![raw(json!({
            "DATETIME": "2024-01-01T00:00:00Z",
            "GAS": "",
            "COAL": null,
            "UNKNOWN": 1
        }))]]));
        let options = RunOptions {
            start: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            ..Default::default()
        };

        let stats = run_ingestion(&options, &client, &mut store, now()).await.unwrap();

        assert_eq!(stats, IngestionStats { fetched: 1, upserted: 1 });
        let rows = store
            .rows_between(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].columns().all(|(_, v)| v.is_none()));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut script: Vec<_> = (0..4).map(|_| Err(TransportError::Status(503))).collect();
        script.push(Ok(DatastoreResponse::from_records(vec![raw(
            json!({"DATETIME": "2024-01-02T06:00:00Z", "GAS": 1}),
        )])));
        let client = client(FakeUpstream::new(script));
        let mut store = memory_store();

        let stats = run_ingestion(&RunOptions::default(), &client, &mut store, now())
            .await
            .unwrap();

        assert_eq!(stats, IngestionStats { fetched: 1, upserted: 1 });
        let slept: Vec<u64> = client_sleeps(&client);
        assert_eq!(slept, vec![1, 2, 4, 8]);
        assert_eq!(slept.iter().sum::<u64>(), 15);
    }

    #[tokio::test]
    async fn test_persistent_failure_propagates() {
        let script = (0..5).map(|_| Err(TransportError::Status(500))).collect();
        let client = client(FakeUpstream::new(script));
        let mut store = memory_store();

        let err = run_ingestion(&RunOptions::default(), &client, &mut store, now())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Fetch { attempts: 5, .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_warehouse_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("genmix.db");
        let config = DatabaseConfig::parse(&format!("sqlite://{}", path.display())).unwrap();

        {
            let mut store = SqliteStore::open(&config).unwrap();
            store.init_schema().unwrap();
            let client = client(FakeUpstream::with_pages(vec![vec![
                raw(json!({"DATETIME": "2024-01-02T06:00:00Z", "SOLAR": 12})),
                raw(json!({"DATETIME": "2024-01-02T06:30:00Z", "SOLAR": 14})),
            ]]));
            run_ingestion(&RunOptions::default(), &client, &mut store, now())
                .await
                .unwrap();
        }

        let mut reopened = SqliteStore::open(&config).unwrap();
        reopened.init_schema().unwrap();
        assert_eq!(reopened.row_count().unwrap(), 2);
        assert_eq!(
            reopened.latest_timestamp().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 6, 30, 0).unwrap())
        );
    }

    fn client_queries(upstream: &FakeUpstream) -> Vec<String> {
        upstream.queries.lock().unwrap().clone()
    }

    fn client_sleeps(client: &NesoClient<FakeUpstream, InstantSleeper>) -> Vec<u64> {
        client
            .sleeper()
            .slept
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_secs())
            .collect()
    }
}
