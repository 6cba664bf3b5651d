use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use assetflow_core::audit::{AuditContext, InMemoryAuditSink};
use assetflow_core::config::DatabaseConfig;
use assetflow_core::domain::asset::{AssetId, AssetStatus, NewAsset};
use assetflow_core::domain::directory::{DepartmentId, UserId, NO_SUPERVISOR};
use assetflow_core::domain::maintenance::NewMaintenanceRecord;
use assetflow_core::errors::ApplicationError;
use assetflow_core::retry::RetryPolicy;
use assetflow_core::rollup::MaintenanceLedger;
use assetflow_core::workflow::{ChainVerdict, WorkflowSettings};
use assetflow_core::{ApprovalWorkflow, AssetService};
use assetflow_db::repositories::{register_user, NewDirectoryUser};
use assetflow_db::{connect, migrations, DirectorySeedDataset, SqlStore};

const REQUESTER: UserId = UserId(30);
const MANAGER_A: UserId = UserId(20);
const MANAGER_B: UserId = UserId(21);

struct Harness {
    _dir: TempDir,
    assets: AssetService<SqlStore>,
    workflow: ApprovalWorkflow<SqlStore>,
    ledger: MaintenanceLedger<SqlStore>,
}

/// File-backed database with several pooled connections, so sessions really overlap.
async fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("assetflow.db").display());
    let pool = connect(&DatabaseConfig { url, max_connections: 4, timeout_secs: 30 })
        .await
        .expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    sqlx::query(DirectorySeedDataset::DEPARTMENTS_SQL)
        .execute(&pool)
        .await
        .expect("departments");
    for (id, manager) in [(REQUESTER, false), (MANAGER_A, true), (MANAGER_B, true)] {
        let entry = NewDirectoryUser {
            id,
            name: format!("user-{}", id.0),
            department_id: DepartmentId(1),
            title: "Staff".to_string(),
            supervisor_id: NO_SUPERVISOR,
            is_asset_manager: manager,
        };
        register_user(&pool, &entry, None).await.expect("register");
    }

    let retry = RetryPolicy::new(5, Duration::from_millis(10));
    let settings = WorkflowSettings { retry, ..WorkflowSettings::default() };
    let sink = Arc::new(InMemoryAuditSink::default());
    let store = SqlStore::new(pool);
    Harness {
        _dir: dir,
        assets: AssetService::new(store.clone(), settings, sink.clone()),
        workflow: ApprovalWorkflow::new(store.clone(), settings, sink.clone()),
        ledger: MaintenanceLedger::new(store, retry, sink),
    }
}

fn context(actor: UserId) -> AuditContext {
    AuditContext::new(format!("req-{}", actor.0), format!("user:{}", actor.0))
}

fn new_asset(name: &str) -> NewAsset {
    NewAsset {
        name: name.to_string(),
        description: String::new(),
        category: "IT".to_string(),
        subcategory: "Hardware".to_string(),
        responsible_person_id: REQUESTER,
    }
}

impl Harness {
    async fn create(&self, name: &str) -> AssetId {
        self.assets
            .create_asset(&context(REQUESTER), REQUESTER, new_asset(name))
            .await
            .expect("create")
            .id
    }

    async fn submit(
        &self,
        asset_id: &AssetId,
        approver: UserId,
        approved: bool,
    ) -> Result<ChainVerdict, ApplicationError> {
        self.workflow
            .submit_approval(&context(approver), asset_id, approver, approved, None)
            .await
            .map(|outcome| outcome.verdict)
    }

    async fn add_cost(&self, asset_id: &AssetId, cost: &str) {
        let record = NewMaintenanceRecord {
            asset_id: asset_id.clone(),
            cost: Decimal::from_str(cost).expect("decimal"),
            maintenance_type: "Service".to_string(),
            vendor: "Acme".to_string(),
            comments: String::new(),
            maintenance_date: NaiveDate::from_ymd_opt(2026, 5, 1).expect("date"),
        };
        self.ledger.add_record(&context(REQUESTER), REQUESTER, record).await.expect("add");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_never_share_an_id() {
    let h = harness().await;

    let (a, b, c, d, e) = tokio::join!(
        h.create("a"),
        h.create("b"),
        h.create("c"),
        h.create("d"),
        h.create("e"),
    );

    let ids: BTreeSet<String> = [a, b, c, d, e].into_iter().map(|id| id.0).collect();
    let expected: BTreeSet<String> =
        (1..=5).map(|number| AssetId::from_sequence(number).0).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_manager_approvals_assign_exactly_once() {
    let h = harness().await;
    let asset_id = h.create("contested").await;
    h.workflow.start_review(&context(REQUESTER), &asset_id, REQUESTER).await.expect("start");

    let (first, second) =
        tokio::join!(h.submit(&asset_id, MANAGER_A, true), h.submit(&asset_id, MANAGER_B, true));

    let outcomes = [first, second];
    let assigned = outcomes.iter().filter(|r| matches!(r, Ok(ChainVerdict::Assigned))).count();
    let late = outcomes.iter().filter(|r| matches!(r, Err(ApplicationError::NoPendingApproval))).count();
    assert_eq!((assigned, late), (1, 1), "{outcomes:?}");
    let asset = h.assets.get_asset(&asset_id).await.expect("asset");
    assert_eq!(asset.status, AssetStatus::Assigned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn approve_and_reject_race_resolves_to_one_consistent_outcome() {
    let h = harness().await;
    let asset_id = h.create("split vote").await;
    h.workflow.start_review(&context(REQUESTER), &asset_id, REQUESTER).await.expect("start");

    let (approve, reject) =
        tokio::join!(h.submit(&asset_id, MANAGER_A, true), h.submit(&asset_id, MANAGER_B, false));

    let status = h.assets.get_asset(&asset_id).await.expect("asset").status;
    match (approve, reject) {
        (Ok(ChainVerdict::Assigned), Err(ApplicationError::NoPendingApproval)) => {
            assert_eq!(status, AssetStatus::Assigned);
        }
        (Err(ApplicationError::NoPendingApproval), Ok(ChainVerdict::Discarded { rejected_by })) => {
            assert_eq!(rejected_by, MANAGER_B);
            assert_eq!(status, AssetStatus::Discarded);
        }
        other => panic!("inconsistent race outcome: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_maintenance_writes_do_not_lose_rollup_updates() {
    let h = harness().await;
    let asset_id = h.create("fleet van").await;

    tokio::join!(
        h.add_cost(&asset_id, "10.00"),
        h.add_cost(&asset_id, "20.00"),
        h.add_cost(&asset_id, "30.25"),
        h.add_cost(&asset_id, "39.75"),
    );

    let asset = h.assets.get_asset(&asset_id).await.expect("asset");
    assert_eq!(asset.value.to_string(), "100.00");
    assert_eq!(h.ledger.list_records(&asset_id).await.expect("records").len(), 4);
}
