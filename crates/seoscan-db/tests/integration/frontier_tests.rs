use seoscan_core::error::AppError;
use seoscan_core::models::{
    BeginOutcome, ClaimOutcome, NewObservation, ObservationKind, PageReport, PageStatus, ScanStatus,
};
use seoscan_core::traits::FrontierStore;
use seoscan_db::FrontierRepository;
use uuid::Uuid;

use crate::integration::common::setup_test_db;

const ROOT: &str = "http://site.test/";

fn report_with(observations: Vec<NewObservation>) -> PageReport {
    PageReport {
        title: "Home".into(),
        description: String::new(),
        observations,
        images: vec![],
    }
}

async fn page_status(pool: &sqlx::PgPool, page_id: Uuid) -> String {
    let (status,): (String,) = sqlx::query_as("SELECT status FROM pages WHERE id = $1")
        .bind(page_id)
        .fetch_one(pool)
        .await
        .unwrap();
    status
}

#[tokio::test]
async fn create_scan_starts_in_starting_state() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);

    let scan = repo.create_scan(ROOT).await.unwrap();

    assert_eq!(scan.status, ScanStatus::Starting);
    assert_eq!(scan.start_url, ROOT);
    assert!(scan.end_time.is_none());

    repo.mark_scan_running(scan.id).await.unwrap();
    let scan = repo.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Running);
}

#[tokio::test]
async fn seed_page_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();

    let first = repo.seed_page(scan.id, ROOT).await.unwrap();
    let second = repo.seed_page(scan.id, ROOT).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.page_counts(scan.id).await.unwrap().total, 1);
}

#[tokio::test]
async fn concurrent_try_claim_has_exactly_one_winner() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.try_claim(scan.id, "http://site.test/shared", Uuid::new_v4())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let winners = results
        .into_iter()
        .filter(|r| matches!(r.as_ref().unwrap(), ClaimOutcome::Claimed(_)))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(repo.page_counts(scan.id).await.unwrap().total, 1);
}

#[tokio::test]
async fn try_claim_reclaims_own_pending_discovery() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();
    let job = Uuid::new_v4();

    let first = repo.try_claim(scan.id, "http://site.test/a", job).await.unwrap();
    let again = repo.try_claim(scan.id, "http://site.test/a", job).await.unwrap();
    let other = repo
        .try_claim(scan.id, "http://site.test/a", Uuid::new_v4())
        .await
        .unwrap();

    assert!(matches!(first, ClaimOutcome::Claimed(_)));
    assert_eq!(first, again);
    assert_eq!(other, ClaimOutcome::AlreadyExists);
}

#[tokio::test]
async fn try_claim_ignores_own_discovery_once_enqueued() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();
    let job = Uuid::new_v4();

    let ClaimOutcome::Claimed(page_id) = repo
        .try_claim(scan.id, "http://site.test/a", job)
        .await
        .unwrap()
    else {
        panic!("first claim should insert the page");
    };
    repo.mark_enqueued(page_id).await.unwrap();

    assert_eq!(
        repo.try_claim(scan.id, "http://site.test/a", job).await.unwrap(),
        ClaimOutcome::AlreadyExists
    );
    assert!(matches!(
        repo.mark_enqueued(Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn same_url_in_different_scans_is_not_deduplicated() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let a = repo.create_scan(ROOT).await.unwrap();
    let b = repo.create_scan(ROOT).await.unwrap();

    let url = "http://site.test/page";
    assert!(matches!(
        repo.try_claim(a.id, url, Uuid::new_v4()).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));
    assert!(matches!(
        repo.try_claim(b.id, url, Uuid::new_v4()).await.unwrap(),
        ClaimOutcome::Claimed(_)
    ));
}

#[tokio::test]
async fn begin_processing_admits_one_lease() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();
    let (lease, rival) = (Uuid::new_v4(), Uuid::new_v4());

    assert_eq!(
        repo.begin_processing(page_id, lease).await.unwrap(),
        BeginOutcome::Started
    );
    assert_eq!(
        repo.begin_processing(page_id, lease).await.unwrap(),
        BeginOutcome::Resumed
    );
    assert_eq!(
        repo.begin_processing(page_id, rival).await.unwrap(),
        BeginOutcome::RaceLost(PageStatus::Processing)
    );
    assert_eq!(page_status(&pool, page_id).await, "processing");
}

#[tokio::test]
async fn complete_page_writes_observations_once() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();
    let lease = Uuid::new_v4();
    repo.begin_processing(page_id, lease).await.unwrap();

    let report = report_with(vec![
        NewObservation::new(ObservationKind::TitleLength, "title length 4, recommended 30–65"),
        NewObservation::new(ObservationKind::MissingDescription, "description is missing"),
    ]);

    assert!(repo.complete_page(page_id, lease, &report).await.unwrap());
    // Duplicate delivery of the same job.
    assert!(!repo.complete_page(page_id, lease, &report).await.unwrap());

    let observations = repo.scan_observations(scan.id).await.unwrap();
    assert_eq!(observations.len(), 2);
    assert!(observations.iter().all(|o| o.url == ROOT));
    assert!(observations.iter().any(|o| o.kind == "missing description"));

    let (title,): (Option<String>,) = sqlx::query_as("SELECT title FROM pages WHERE id = $1")
        .bind(page_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title.as_deref(), Some("Home"));
}

#[tokio::test]
async fn complete_page_requires_the_lease() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();

    // Still pending: nothing to complete.
    assert!(!repo
        .complete_page(page_id, Uuid::new_v4(), &report_with(vec![]))
        .await
        .unwrap());

    repo.begin_processing(page_id, Uuid::new_v4()).await.unwrap();
    let report = report_with(vec![NewObservation::new(
        ObservationKind::MissingTitle,
        "title is missing",
    )]);
    assert!(!repo
        .complete_page(page_id, Uuid::new_v4(), &report)
        .await
        .unwrap());

    assert_eq!(page_status(&pool, page_id).await, "processing");
    assert!(repo.scan_observations(scan.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn fail_page_is_guarded_by_lease() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();
    let lease = Uuid::new_v4();
    repo.begin_processing(page_id, lease).await.unwrap();

    assert!(!repo.fail_page(page_id, Uuid::new_v4()).await.unwrap());
    assert!(repo.fail_page(page_id, lease).await.unwrap());
    assert_eq!(page_status(&pool, page_id).await, "failed");

    // Terminal pages never move again.
    assert!(!repo.fail_page(page_id, lease).await.unwrap());
    assert!(!repo
        .complete_page(page_id, lease, &report_with(vec![]))
        .await
        .unwrap());
    assert_eq!(
        repo.begin_processing(page_id, lease).await.unwrap(),
        BeginOutcome::RaceLost(PageStatus::Failed)
    );
}

#[tokio::test]
async fn scan_completes_once_when_drained() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();

    // Not running yet.
    assert!(!repo.mark_scan_completed(scan.id).await.unwrap());
    repo.mark_scan_running(scan.id).await.unwrap();

    // Unfinished pages block completion.
    assert_eq!(repo.pending_count(scan.id).await.unwrap(), 1);
    assert!(!repo.mark_scan_completed(scan.id).await.unwrap());

    let lease = Uuid::new_v4();
    repo.begin_processing(page_id, lease).await.unwrap();
    assert_eq!(repo.pending_count(scan.id).await.unwrap(), 1);
    repo.complete_page(page_id, lease, &report_with(vec![]))
        .await
        .unwrap();
    assert_eq!(repo.pending_count(scan.id).await.unwrap(), 0);

    let attempts = futures::future::join_all((0..5).map(|_| repo.mark_scan_completed(scan.id))).await;
    let transitions = attempts.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(transitions, 1);

    let scan = repo.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
    assert!(scan.end_time.is_some());
}

#[tokio::test]
async fn page_counts_and_listing() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let older = repo.create_scan("http://one.test/").await.unwrap();
    let scan = repo.create_scan(ROOT).await.unwrap();

    let root = repo.seed_page(scan.id, ROOT).await.unwrap();
    let job = Uuid::new_v4();
    repo.try_claim(scan.id, "http://site.test/a", job).await.unwrap();
    repo.try_claim(scan.id, "http://site.test/b", job).await.unwrap();
    repo.begin_processing(root, job).await.unwrap();

    let counts = repo.page_counts(scan.id).await.unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.processing, 1);
    assert_eq!(counts.unfinished(), 3);

    let scans = repo.list_scans(10).await.unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].id, scan.id);
    assert_eq!(scans[1].id, older.id);
    assert!(repo.get_scan(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn complete_page_rolls_back_when_observation_insert_fails() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();
    let page_id = repo.seed_page(scan.id, ROOT).await.unwrap();
    let lease = Uuid::new_v4();
    repo.begin_processing(page_id, lease).await.unwrap();

    sqlx::query(
        r#"
        CREATE FUNCTION reject_observations() RETURNS trigger AS $$
        BEGIN
            RAISE EXCEPTION 'observations are read-only';
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TRIGGER observations_read_only
        BEFORE INSERT ON observations
        FOR EACH ROW EXECUTE FUNCTION reject_observations()
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let report = report_with(vec![NewObservation::new(
        ObservationKind::MissingDescription,
        "description is missing",
    )]);
    let err = repo.complete_page(page_id, lease, &report).await.unwrap_err();
    assert!(matches!(err, AppError::DatabaseError(_)));

    assert_eq!(page_status(&pool, page_id).await, "processing");
    let (title,): (Option<String>,) = sqlx::query_as("SELECT title FROM pages WHERE id = $1")
        .bind(page_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(title.is_none());
    assert!(repo.scan_observations(scan.id).await.unwrap().is_empty());

    // Once the store recovers the same lease can still finish the page.
    sqlx::query("DROP TRIGGER observations_read_only ON observations")
        .execute(&pool)
        .await
        .unwrap();
    assert!(repo.complete_page(page_id, lease, &report).await.unwrap());
    assert_eq!(repo.scan_observations(scan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_scan_status_is_an_error() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool.clone());
    let scan = repo.create_scan(ROOT).await.unwrap();

    sqlx::query("ALTER TABLE scans DROP CONSTRAINT chk_scans_status")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE scans SET status = 'paused' WHERE id = $1")
        .bind(scan.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        repo.get_scan(scan.id).await,
        Err(AppError::DatabaseError(_))
    ));
    assert!(repo.list_scans(10).await.is_err());
}

#[tokio::test]
async fn duplicate_metadata_groups_completed_pages() {
    let (pool, _container) = setup_test_db().await;
    let repo = FrontierRepository::new(pool);
    let scan = repo.create_scan(ROOT).await.unwrap();

    let pages = [
        ("http://site.test/", "Welcome", "Same words everywhere"),
        ("http://site.test/b", "Welcome", "Same words everywhere"),
        ("http://site.test/a", "Welcome", ""),
        ("http://site.test/c", "Unique", ""),
    ];
    for (url, title, description) in pages {
        let page_id = repo.seed_page(scan.id, url).await.unwrap();
        let lease = Uuid::new_v4();
        repo.begin_processing(page_id, lease).await.unwrap();
        let report = PageReport {
            title: title.into(),
            description: description.into(),
            observations: vec![],
            images: vec![],
        };
        repo.complete_page(page_id, lease, &report).await.unwrap();
    }
    // Pending pages carry no metadata yet.
    repo.seed_page(scan.id, "http://site.test/d").await.unwrap();

    let groups = repo.duplicate_metadata(scan.id).await.unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].kind, ObservationKind::DuplicateTitle);
    assert_eq!(groups[0].value, "Welcome");
    assert_eq!(
        groups[0].urls,
        vec![
            "http://site.test/".to_string(),
            "http://site.test/a".to_string(),
            "http://site.test/b".to_string(),
        ]
    );
    assert_eq!(groups[1].kind, ObservationKind::DuplicateDescription);
    assert_eq!(groups[1].urls.len(), 2);
}
