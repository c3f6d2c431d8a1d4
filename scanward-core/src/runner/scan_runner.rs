use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{OutcomeSource, RandomOutcomes, RunnerSettings};
use crate::application::AppUnitOfWork;
use crate::domain::{
    CHECKS_INCOMPLETE_REASON, NO_CHECKS_REASON, NewFinding, Scan, ScanCompletion, ScanId,
    ScanStatus,
};
use crate::error::{CoreError, Result};

/// What a single invocation of [`ScanRunner::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The scan no longer exists.
    Missing,
    /// The scan had already reached a terminal state; nothing was touched.
    AlreadyFinished(ScanStatus),
    Finished {
        status: ScanStatus,
        /// Findings recorded by this invocation.
        findings: usize,
        failed_reason: Option<String>,
    },
}

struct Outcome {
    status: ScanStatus,
    failed_reason: Option<String>,
    findings: usize,
}

impl Outcome {
    fn failed(reason: impl Into<String>, findings: usize) -> Self {
        Self {
            status: ScanStatus::Failed,
            failed_reason: Some(reason.into()),
            findings,
        }
    }
}

/// Drives one scan from `pending` to a terminal status, executing the
/// provider's checks one after another.
#[derive(Clone)]
pub struct ScanRunner {
    uow: AppUnitOfWork,
    settings: RunnerSettings,
    outcomes: Arc<dyn OutcomeSource>,
}

impl std::fmt::Debug for ScanRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanRunner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ScanRunner {
    pub fn new(uow: AppUnitOfWork, settings: RunnerSettings) -> Self {
        Self::with_outcomes(uow, settings, Arc::new(RandomOutcomes))
    }

    pub fn with_outcomes(
        uow: AppUnitOfWork,
        settings: RunnerSettings,
        outcomes: Arc<dyn OutcomeSource>,
    ) -> Self {
        Self {
            uow,
            settings,
            outcomes,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Execute the scan. Simulated check failures and storage errors during
    /// the checks end the scan as `failed`; an `Err` is only returned when
    /// the scan state itself could not be read or written.
    pub async fn run(&self, scan_id: ScanId) -> Result<RunReport> {
        self.run_inner(scan_id)
            .instrument(info_span!("scan_run", scan_id = %scan_id))
            .await
    }

    async fn run_inner(&self, scan_id: ScanId) -> Result<RunReport> {
        let Some(scan) = self.uow.scans.get(scan_id).await? else {
            info!("scan does not exist; nothing to run");
            return Ok(RunReport::Missing);
        };

        if scan.status.is_terminal() {
            info!(status = %scan.status, "scan already finished; skipping redelivered run");
            return Ok(RunReport::AlreadyFinished(scan.status));
        }

        if scan.status == ScanStatus::InProgress {
            warn!("scan was left in_progress; restarting it from the first check");
        }

        let started_at = Utc::now();
        let scan = match self.uow.scans.mark_started(scan_id, started_at).await {
            Ok(scan) => scan,
            Err(CoreError::NotFound(_)) => {
                info!("scan deleted before it started");
                return Ok(RunReport::Missing);
            }
            Err(CoreError::Conflict(reason)) => {
                info!(%reason, "scan finished by another run before this one started");
                return self.current_report(scan_id).await;
            }
            Err(err) => return Err(err),
        };
        info!(name = %scan.name, provider_id = %scan.provider_id, "scan started");

        let outcome = self.execute_checks(&scan).await;

        let completion = ScanCompletion {
            status: outcome.status,
            failed_reason: outcome.failed_reason.clone(),
            finished_at: Utc::now(),
        };
        match self.uow.scans.mark_finished(scan_id, completion).await {
            Ok(_) => {}
            Err(CoreError::NotFound(_)) => {
                warn!("scan deleted while it was running");
                return Ok(RunReport::Missing);
            }
            Err(CoreError::Conflict(reason)) => {
                warn!(%reason, "scan was finished by another run; keeping its result");
                return self.current_report(scan_id).await;
            }
            Err(err) => return Err(err),
        }

        info!(
            status = %outcome.status,
            findings = outcome.findings,
            failed_reason = outcome.failed_reason.as_deref().unwrap_or(""),
            "scan finished"
        );
        Ok(RunReport::Finished {
            status: outcome.status,
            findings: outcome.findings,
            failed_reason: outcome.failed_reason,
        })
    }

    async fn current_report(&self, scan_id: ScanId) -> Result<RunReport> {
        Ok(match self.uow.scans.get(scan_id).await? {
            Some(scan) => RunReport::AlreadyFinished(scan.status),
            None => RunReport::Missing,
        })
    }

    /// Storage errors end the run as `failed`, keeping the count of findings
    /// recorded before the error.
    async fn execute_checks(&self, scan: &Scan) -> Outcome {
        let aborted = |err: CoreError, recorded: usize| {
            error!(error = %err, recorded, "scan aborted by a storage error");
            Outcome::failed(err.to_string(), recorded)
        };

        let checks = match self.uow.checks.all_for_provider(scan.provider_id).await {
            Ok(checks) => checks,
            Err(err) => return aborted(err, 0),
        };
        if checks.is_empty() {
            warn!(reason = NO_CHECKS_REASON, "scan failed");
            return Outcome::failed(NO_CHECKS_REASON, 0);
        }

        let mut recorded = 0;
        for check in &checks {
            if !self.settings.check_delay.is_zero() {
                tokio::time::sleep(self.settings.check_delay).await;
            }

            if self.outcomes.draw() < self.settings.exception_rate {
                warn!(
                    check = %check.name,
                    reason = CHECKS_INCOMPLETE_REASON,
                    "check could not be completed; failing scan"
                );
                return Outcome::failed(CHECKS_INCOMPLETE_REASON, recorded);
            }

            let success = self.outcomes.draw() < self.settings.success_rate;
            let finding = NewFinding {
                scan_id: scan.id,
                check_id: check.id,
                success,
                comment: None,
            };
            match self.uow.findings.create(finding).await {
                Ok(_) => {
                    recorded += 1;
                    debug!(check = %check.name, success, "check executed");
                }
                Err(CoreError::Conflict(_)) => {
                    info!(
                        check = %check.name,
                        "finding already recorded by an earlier delivery; keeping it"
                    );
                }
                Err(err) => return aborted(err, recorded),
            }
        }

        Outcome {
            status: ScanStatus::Completed,
            failed_reason: None,
            findings: recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::database::ports::PageRequest;
    use crate::database::MemoryStore;
    use crate::domain::{NewScan, ProviderId};
    use crate::runner::ScriptedOutcomes;

    struct Fixture {
        uow: AppUnitOfWork,
        provider_id: ProviderId,
    }

    async fn fixture(checks: &[&str]) -> Fixture {
        let uow = AppUnitOfWork::in_memory(&MemoryStore::new());
        let provider = uow.providers.create("AWS").await.unwrap();
        for check in checks {
            uow.checks.create(provider.id, check).await.unwrap();
        }
        Fixture {
            uow,
            provider_id: provider.id,
        }
    }

    impl Fixture {
        async fn scan(&self, name: &str) -> ScanId {
            self.uow
                .scans
                .create(NewScan {
                    provider_id: self.provider_id,
                    name: name.to_string(),
                    comment: None,
                })
                .await
                .unwrap()
                .id
        }

        fn runner(&self, settings: RunnerSettings, draws: Vec<f64>) -> ScanRunner {
            ScanRunner::with_outcomes(
                self.uow.clone(),
                settings,
                Arc::new(ScriptedOutcomes::new(draws, 0.5)),
            )
        }
    }

    fn settings(exception_rate: f64, success_rate: f64) -> RunnerSettings {
        RunnerSettings {
            check_delay: Duration::ZERO,
            exception_rate,
            success_rate,
        }
    }

    #[tokio::test]
    async fn all_checks_pass_and_the_scan_completes() {
        let fx = fixture(&["S3", "EC2", "IAM"]).await;
        let scan_id = fx.scan("nightly").await;

        let report = fx
            .runner(RunnerSettings::deterministic(), vec![])
            .run(scan_id)
            .await
            .unwrap();
        assert_eq!(
            report,
            RunReport::Finished {
                status: ScanStatus::Completed,
                findings: 3,
                failed_reason: None,
            }
        );

        let scan = fx.uow.scans.get(scan_id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Completed);
        assert!(scan.started_at.is_some());
        assert!(scan.finished_at >= scan.started_at);

        let summary = fx.uow.scans.summary(scan_id).await.unwrap().unwrap();
        assert_eq!(summary.checks_total, 3);
        assert_eq!(summary.checks_executed, 3);
        assert_eq!(summary.checks_pending, 0);
        assert_eq!(summary.checks_success, 3);
        assert_eq!(summary.success, Some(true));
    }

    #[tokio::test]
    async fn provider_without_checks_fails_immediately() {
        let fx = fixture(&[]).await;
        let scan_id = fx.scan("empty").await;

        fx.runner(RunnerSettings::deterministic(), vec![])
            .run(scan_id)
            .await
            .unwrap();

        let scan = fx.uow.scans.get(scan_id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);
        assert_eq!(scan.failed_reason.as_deref(), Some(NO_CHECKS_REASON));
        assert_eq!(fx.uow.findings.count_for_scan(scan_id).await.unwrap(), 0);
        assert!(scan.started_at.is_some() && scan.finished_at.is_some());
    }

    #[tokio::test]
    async fn first_exception_stops_the_scan() {
        let fx = fixture(&["EC2", "IAM", "S3"]).await;
        let scan_id = fx.scan("flaky").await;

        // EC2: no exception, pass. IAM: exception.
        let draws = vec![0.9, 0.1, 0.0];
        let report = fx.runner(settings(0.5, 0.8), draws).run(scan_id).await.unwrap();
        assert_eq!(
            report,
            RunReport::Finished {
                status: ScanStatus::Failed,
                findings: 1,
                failed_reason: Some(CHECKS_INCOMPLETE_REASON.to_string()),
            }
        );

        let findings = fx.uow.findings.all_for_scan(scan_id).await.unwrap();
        assert_eq!(findings.len(), 1);
        let ec2 = fx.uow.checks.all_for_provider(fx.provider_id).await.unwrap()[0].clone();
        assert_eq!(ec2.name, "EC2");
        assert_eq!(findings[0].check_id, ec2.id);
        assert!(findings[0].success);

        let summary = fx.uow.scans.summary(scan_id).await.unwrap().unwrap();
        assert_eq!(summary.checks_pending, 2);
        assert_eq!(summary.success, None);
    }

    #[tokio::test]
    async fn failing_checks_still_complete_the_scan() {
        let fx = fixture(&["EC2", "S3"]).await;
        let scan_id = fx.scan("mixed").await;

        // EC2: fail, S3: pass.
        let draws = vec![0.9, 0.95, 0.9, 0.1];
        fx.runner(settings(0.0, 0.8), draws).run(scan_id).await.unwrap();

        let summary = fx.uow.scans.summary(scan_id).await.unwrap().unwrap();
        assert_eq!(summary.checks_failed, 1);
        assert_eq!(summary.checks_success, 1);
        assert_eq!(summary.success, Some(false));
        assert_eq!(
            fx.uow.scans.get(scan_id).await.unwrap().unwrap().status,
            ScanStatus::Completed
        );
    }

    #[tokio::test]
    async fn missing_scan_is_not_an_error() {
        let fx = fixture(&["S3"]).await;
        let report = fx
            .runner(RunnerSettings::deterministic(), vec![])
            .run(ScanId::new())
            .await
            .unwrap();
        assert_eq!(report, RunReport::Missing);
    }

    #[tokio::test]
    async fn redelivery_of_a_finished_scan_changes_nothing() {
        let fx = fixture(&["S3", "EC2"]).await;
        let scan_id = fx.scan("once").await;
        let runner = fx.runner(RunnerSettings::deterministic(), vec![]);

        runner.run(scan_id).await.unwrap();
        let first = fx.uow.scans.get(scan_id).await.unwrap().unwrap();

        let report = runner.run(scan_id).await.unwrap();
        assert_eq!(report, RunReport::AlreadyFinished(ScanStatus::Completed));
        assert_eq!(fx.uow.scans.get(scan_id).await.unwrap().unwrap(), first);
        assert_eq!(fx.uow.findings.count_for_scan(scan_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn interrupted_scan_restarts_and_keeps_existing_findings() {
        let fx = fixture(&["EC2", "S3"]).await;
        let scan_id = fx.scan("crashed").await;

        // Simulate a worker that died after recording the first finding.
        fx.uow.scans.mark_started(scan_id, Utc::now()).await.unwrap();
        let ec2 = fx.uow.checks.all_for_provider(fx.provider_id).await.unwrap()[0].clone();
        let kept = fx
            .uow
            .findings
            .create(NewFinding {
                scan_id,
                check_id: ec2.id,
                success: false,
                comment: Some("from the first delivery".to_string()),
            })
            .await
            .unwrap();

        let report = fx
            .runner(RunnerSettings::deterministic(), vec![])
            .run(scan_id)
            .await
            .unwrap();
        assert_eq!(
            report,
            RunReport::Finished {
                status: ScanStatus::Completed,
                findings: 1,
                failed_reason: None,
            }
        );

        let findings = fx
            .uow
            .findings
            .list_for_scan(scan_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(findings.len(), 2);
        let stored = fx.uow.findings.get(scan_id, kept.id).await.unwrap().unwrap();
        assert_eq!(stored, kept);
    }

    #[tokio::test]
    async fn storage_errors_fail_the_scan_with_their_message() {
        use crate::application::AppUnitOfWorkBuilder;
        use crate::database::ports::checks::MockCheckRepository;

        let store = MemoryStore::new();
        let base = AppUnitOfWork::in_memory(&store);
        let provider = base.providers.create("AWS").await.unwrap();
        let scan_id = base
            .scans
            .create(NewScan {
                provider_id: provider.id,
                name: "broken".to_string(),
                comment: None,
            })
            .await
            .unwrap()
            .id;

        let mut checks = MockCheckRepository::new();
        checks
            .expect_all_for_provider()
            .times(1)
            .returning(|_| Err(CoreError::Internal("connection reset".to_string())));
        let uow = AppUnitOfWorkBuilder::new()
            .with_providers(base.providers.clone())
            .with_checks(Arc::new(checks))
            .with_scans(base.scans.clone())
            .with_findings(base.findings.clone())
            .build()
            .unwrap();

        let report = ScanRunner::new(uow, RunnerSettings::deterministic())
            .run(scan_id)
            .await
            .unwrap();
        let RunReport::Finished {
            status,
            failed_reason,
            ..
        } = report
        else {
            panic!("expected a finished run, got {report:?}");
        };
        assert_eq!(status, ScanStatus::Failed);
        assert!(failed_reason.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn storage_error_midway_reports_findings_already_recorded() {
        use crate::application::AppUnitOfWorkBuilder;
        use crate::database::ports::findings::MockFindingRepository;
        use crate::domain::{Finding, FindingId};

        let fx = fixture(&["EC2", "IAM", "S3"]).await;
        let scan_id = fx.scan("partial").await;

        let mut findings = MockFindingRepository::new();
        let mut calls = 0;
        findings.expect_create().times(2).returning(move |new| {
            calls += 1;
            if calls == 1 {
                Ok(Finding {
                    id: FindingId::new(),
                    scan_id: new.scan_id,
                    check_id: new.check_id,
                    success: new.success,
                    comment: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            } else {
                Err(CoreError::Internal("disk full".to_string()))
            }
        });
        let uow = AppUnitOfWorkBuilder::new()
            .with_providers(fx.uow.providers.clone())
            .with_checks(fx.uow.checks.clone())
            .with_scans(fx.uow.scans.clone())
            .with_findings(Arc::new(findings))
            .build()
            .unwrap();

        let report = ScanRunner::new(uow, RunnerSettings::deterministic())
            .run(scan_id)
            .await
            .unwrap();
        assert_eq!(
            report,
            RunReport::Finished {
                status: ScanStatus::Failed,
                findings: 1,
                failed_reason: Some("Internal error: disk full".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn in_progress_is_visible_while_checks_run() {
        let fx = fixture(&["S3", "EC2"]).await;
        let scan_id = fx.scan("slow").await;
        let runner = fx.runner(
            RunnerSettings {
                check_delay: Duration::from_millis(200),
                ..RunnerSettings::deterministic()
            },
            vec![],
        );

        let handle = tokio::spawn(async move { runner.run(scan_id).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let scan = fx.uow.scans.get(scan_id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::InProgress);
        assert!(scan.started_at.is_some());
        assert!(scan.finished_at.is_none());
        assert_eq!(fx.uow.scans.summary(scan_id).await.unwrap().unwrap().success, None);

        handle.await.unwrap().unwrap();
        let scan = fx.uow.scans.get(scan_id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Completed);
    }
}
