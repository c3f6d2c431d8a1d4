#![cfg(feature = "postgres-tests")]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use scanward_core::application::AppUnitOfWork;
use scanward_core::database::{PageRequest, PostgresDatabase};
use scanward_core::domain::{NewFinding, NewScan, ScanStatus};
use scanward_core::error::CoreError;
use scanward_core::queue::{
    JobQueue, LeaseRenewal, PostgresJobQueue, PostgresWorkerRegistry, WorkerRegistry,
};
use scanward_core::runner::{RunReport, RunnerSettings, ScanRunner};
use sqlx::PgPool;

fn uow(pool: &PgPool) -> AppUnitOfWork {
    AppUnitOfWork::from_postgres(&PostgresDatabase::from_pool(pool.clone(), 5))
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn uniqueness_and_validation_are_classified(pool: PgPool) -> Result<()> {
    let uow = uow(&pool);
    let aws = uow.providers.create("AWS").await?;
    let gcp = uow.providers.create("GCP").await?;

    let err = uow.providers.create("AWS").await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let s3 = uow.checks.create(aws.id, "S3").await?;
    uow.checks.create(gcp.id, "S3").await?;
    assert!(uow.checks.create(aws.id, "S3").await.unwrap_err().is_conflict());

    let foreign = uow.checks.create(gcp.id, "IAM").await?;
    let scan = uow
        .scans
        .create(NewScan {
            provider_id: aws.id,
            name: "nightly".into(),
            comment: None,
        })
        .await?;

    let err = uow
        .findings
        .create(NewFinding {
            scan_id: scan.id,
            check_id: foreign.id,
            success: true,
            comment: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let finding = NewFinding {
        scan_id: scan.id,
        check_id: s3.id,
        success: true,
        comment: None,
    };
    uow.findings.create(finding.clone()).await?;
    assert!(uow.findings.create(finding).await.unwrap_err().is_conflict());
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn runner_completes_and_summary_counts(pool: PgPool) -> Result<()> {
    let uow = uow(&pool);
    let aws = uow.providers.create("AWS").await?;
    for name in ["S3", "EC2", "IAM"] {
        uow.checks.create(aws.id, name).await?;
    }
    let scan = uow
        .scans
        .create(NewScan {
            provider_id: aws.id,
            name: "nightly".into(),
            comment: None,
        })
        .await?;

    let report = ScanRunner::new(uow.clone(), RunnerSettings::deterministic())
        .run(scan.id)
        .await?;
    assert!(matches!(
        report,
        RunReport::Finished {
            status: ScanStatus::Completed,
            findings: 3,
            ..
        }
    ));

    let summary = uow.scans.summary(scan.id).await?.expect("scan exists");
    assert_eq!(summary.checks_total, 3);
    assert_eq!(summary.checks_executed, 3);
    assert_eq!(summary.checks_pending, 0);
    assert_eq!(summary.checks_success, 3);
    assert_eq!(summary.success, Some(true));

    let providers = uow.providers.list(PageRequest::default()).await?;
    assert_eq!(providers[0].checks_total, 3);
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn provider_delete_cascades(pool: PgPool) -> Result<()> {
    let uow = uow(&pool);
    let aws = uow.providers.create("AWS").await?;
    uow.checks.create(aws.id, "S3").await?;
    let scan = uow
        .scans
        .create(NewScan {
            provider_id: aws.id,
            name: "nightly".into(),
            comment: None,
        })
        .await?;
    ScanRunner::new(uow.clone(), RunnerSettings::deterministic())
        .run(scan.id)
        .await?;

    assert!(uow.providers.delete(aws.id).await?);
    assert!(uow.scans.get(scan.id).await?.is_none());
    assert_eq!(uow.findings.count_for_scan(scan.id).await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn queue_leases_and_redelivers(pool: PgPool) -> Result<()> {
    let queue = PostgresJobQueue::with_lease_ttl(pool.clone(), Duration::ZERO);
    let scan_id = scanward_core::domain::ScanId::new();
    let handle = queue.enqueue(scan_id).await?;
    assert_eq!(queue.depth().await?, 1);

    let first = queue.dequeue("crashed").await?.expect("job ready");
    assert_eq!(first.id, handle.id);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = queue.dequeue("w2").await?.expect("lease expired");
    assert_eq!(second.id, handle.id);
    assert_eq!(second.attempts, 2);

    // The first delivery's lease is gone; only the current holder settles.
    assert!(queue.complete(first.lease_id).await.unwrap_err().is_not_found());
    queue.complete(second.lease_id).await?;
    assert!(queue.dequeue("w3").await?.is_none());
    assert_eq!(queue.depth().await?, 0);
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn renewal_extends_only_the_held_lease(pool: PgPool) -> Result<()> {
    let queue = PostgresJobQueue::with_lease_ttl(pool, Duration::from_millis(200));
    queue.enqueue(scanward_core::domain::ScanId::new()).await?;
    let held = queue.dequeue("w1").await?.expect("job ready");

    let expires_at = queue
        .renew(LeaseRenewal {
            lease_id: held.lease_id,
            extend_by: Duration::from_secs(60),
        })
        .await?;
    assert!(expires_at > held.lease_expires_at);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(queue.dequeue("w2").await?.is_none());

    queue.complete(held.lease_id).await?;
    let renewal = LeaseRenewal {
        lease_id: held.lease_id,
        extend_by: Duration::from_secs(60),
    };
    assert!(queue.renew(renewal).await.unwrap_err().is_not_found());
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn timestamps_are_independent_of_session_time_zone(pool: PgPool) -> Result<()> {
    let uow = uow(&pool);
    let aws = uow.providers.create("AWS").await?;

    let mut conn = pool.acquire().await?;
    sqlx::query("SET TIME ZONE 'America/New_York'")
        .execute(&mut *conn)
        .await?;
    let stored: chrono::DateTime<Utc> =
        sqlx::query_scalar("SELECT created_at FROM providers WHERE id = $1")
            .bind(aws.id)
            .fetch_one(&mut *conn)
            .await?;
    assert_eq!(stored, aws.created_at);
    Ok(())
}

#[sqlx::test(migrator = "scanward_core::MIGRATOR")]
async fn registry_tracks_heartbeats(pool: PgPool) -> Result<()> {
    let registry: Arc<dyn WorkerRegistry> = Arc::new(PostgresWorkerRegistry::new(pool));
    assert!(registry.latest_heartbeat().await?.is_none());

    registry.heartbeat("w1", Utc::now()).await?;
    assert!(registry.latest_heartbeat().await?.is_some());

    registry.deregister("w1").await?;
    assert!(registry.latest_heartbeat().await?.is_none());
    Ok(())
}
