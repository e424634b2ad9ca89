#[cfg(test)]
mod tests {
    use crate::{Database, ProcessedRecord};
    use replybot_core::{CoreError, DatabaseError, ParsedReference};
    use std::env;
    use std::path::PathBuf;

    fn temp_db_url() -> (PathBuf, String) {
        let db_path = env::temp_dir().join(format!("test_replybot_{}.db", uuid::Uuid::new_v4()));
        let db_url = format!("sqlite://{}", db_path.display());
        (db_path, db_url)
    }

    async fn open(db_url: &str) -> Database {
        let mut db = Database::new(db_url.to_string());
        db.connect()
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");
        db
    }

    async fn setup_test_db() -> Database {
        let (_, db_url) = temp_db_url();
        open(&db_url).await
    }

    fn reference(post_id: &str, comment_id: Option<&str>) -> ParsedReference {
        ParsedReference {
            url: format!("https://www.reddit.com/r/AusFinance/comments/{}/title/", post_id),
            post_id: post_id.to_string(),
            comment_id: comment_id.map(str::to_string),
            content: "content".to_string(),
            subject: "subject".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fresh_ledger_is_empty() {
        let db = setup_test_db().await;

        assert!(!db.is_processed("msg-1").await.unwrap());
        assert!(db.get_entry("msg-1").await.unwrap().is_none());

        let stats = db.get_stats().await.unwrap();
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.relevant, 0);
        assert_eq!(stats.responses_posted, 0);
    }

    #[tokio::test]
    async fn test_mark_processed_is_visible() {
        let db = setup_test_db().await;
        let record = ProcessedRecord::for_reference("msg-1", &reference("abc123", Some("def456")))
            .relevant(true)
            .posted("https://reddit.com/r/AusFinance/comments/abc123/title/zzz999/");

        db.mark_processed(&record).await.unwrap();

        assert!(db.is_processed("msg-1").await.unwrap());
        let entry = db.get_entry("msg-1").await.unwrap().expect("entry stored");
        assert_eq!(entry.post_id, "abc123");
        assert_eq!(entry.comment_id.as_deref(), Some("def456"));
        assert!(entry.relevant);
        assert!(entry.response_posted);
        assert_eq!(
            entry.response_url.as_deref(),
            Some("https://reddit.com/r/AusFinance/comments/abc123/title/zzz999/")
        );
    }

    #[tokio::test]
    async fn test_unparseable_record_has_empty_reference() {
        let db = setup_test_db().await;
        db.mark_processed(&ProcessedRecord::unparseable("msg-x"))
            .await
            .unwrap();

        let entry = db.get_entry("msg-x").await.unwrap().unwrap();
        assert_eq!(entry.reddit_url, "");
        assert_eq!(entry.post_id, "");
        assert_eq!(entry.comment_id, None);
        assert!(!entry.relevant);
        assert!(!entry.response_posted);
        assert_eq!(entry.response_url, None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_outcome_and_keeps_first_timestamp() {
        let db = setup_test_db().await;
        let first = ProcessedRecord::for_reference("msg-1", &reference("abc123", None)).relevant(true);
        db.mark_processed(&first).await.unwrap();
        let before = db.get_entry("msg-1").await.unwrap().unwrap();

        let second = ProcessedRecord::for_reference("msg-1", &reference("abc123", None))
            .relevant(true)
            .posted("https://reddit.com/r/AusFinance/comments/abc123/title/n3w1d/");
        db.mark_processed(&second).await.unwrap();

        let after = db.get_entry("msg-1").await.unwrap().unwrap();
        assert!(after.response_posted);
        assert_eq!(after.processed_at, before.processed_at);
        assert_eq!(db.get_stats().await.unwrap().total_processed, 1);
    }

    #[tokio::test]
    async fn test_stats_are_recomputed() {
        let db = setup_test_db().await;

        db.mark_processed(&ProcessedRecord::unparseable("m0")).await.unwrap();
        db.mark_processed(&ProcessedRecord::for_reference("m1", &reference("p1", None)))
            .await
            .unwrap();
        db.mark_processed(&ProcessedRecord::for_reference("m2", &reference("p2", None)).relevant(true))
            .await
            .unwrap();
        db.mark_processed(
            &ProcessedRecord::for_reference("m3", &reference("p3", Some("c3")))
                .relevant(true)
                .posted("https://reddit.com/x"),
        )
        .await
        .unwrap();

        let stats = db.get_stats().await.unwrap();
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.relevant, 2);
        assert_eq!(stats.responses_posted, 1);

        db.mark_processed(&ProcessedRecord::for_reference("m2", &reference("p2", None)))
            .await
            .unwrap();
        assert_eq!(db.get_stats().await.unwrap().relevant, 1);
    }

    #[tokio::test]
    async fn test_processed_survives_restart() {
        let (db_path, db_url) = temp_db_url();

        let mut db = open(&db_url).await;
        db.mark_processed(&ProcessedRecord::unparseable("msg-1"))
            .await
            .unwrap();
        db.close().await;

        let reopened = open(&db_url).await;
        assert!(reopened.is_processed("msg-1").await.unwrap());
        assert!(!reopened.is_processed("msg-2").await.unwrap());

        let _ = std::fs::remove_file(db_path);
    }

    #[tokio::test]
    async fn test_queries_before_connect_fail() {
        let db = Database::new("sqlite::memory:".to_string());
        let err = db.is_processed("msg-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Database(DatabaseError::NotConnected)));
    }

    #[tokio::test]
    async fn test_in_memory_ledger() {
        let db = open("sqlite::memory:").await;
        db.mark_processed(&ProcessedRecord::unparseable("msg-1"))
            .await
            .unwrap();
        assert!(db.is_processed("msg-1").await.unwrap());
    }
}
