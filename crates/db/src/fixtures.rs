use sqlx::Executor;

use assetflow_core::domain::directory::{DepartmentId, UserId, NO_SUPERVISOR};

use crate::connection::DbPool;
use crate::repositories::{register_user, NewDirectoryUser, RepositoryError};

/// Password given to every seeded user. Stored only as an Argon2 hash.
pub const DEMO_PASSWORD: &str = "assetflow-demo";

const SEED_DEPARTMENT_IDS: &[i64] = &[1, 2, 3];

/// Directory cast covering every approval chain shape: a supervised requester, a supervisor
/// who is not a manager, managers in two departments, a user without a supervisor and a user
/// who supervises themself.
const SEED_USERS: &[SeedUserContract] = &[
    SeedUserContract {
        id: 1,
        name: "riley.requester",
        department_id: 1,
        title: "Field Technician",
        supervisor_id: 10,
        is_asset_manager: false,
        description: "requester reporting to a supervisor",
    },
    SeedUserContract {
        id: 10,
        name: "sam.supervisor",
        department_id: 1,
        title: "Operations Lead",
        supervisor_id: 0,
        is_asset_manager: false,
        description: "supervisor, not an asset manager",
    },
    SeedUserContract {
        id: 20,
        name: "morgan.manager",
        department_id: 1,
        title: "Asset Manager",
        supervisor_id: 0,
        is_asset_manager: true,
        description: "asset manager in operations",
    },
    SeedUserContract {
        id: 21,
        name: "frankie.finance",
        department_id: 2,
        title: "Asset Manager",
        supervisor_id: 0,
        is_asset_manager: true,
        description: "asset manager in finance",
    },
    SeedUserContract {
        id: 30,
        name: "nico.solo",
        department_id: 3,
        title: "Contractor",
        supervisor_id: 0,
        is_asset_manager: false,
        description: "requester without a supervisor",
    },
    SeedUserContract {
        id: 31,
        name: "jo.selflead",
        department_id: 3,
        title: "Engineering Director",
        supervisor_id: 31,
        is_asset_manager: false,
        description: "requester listed as their own supervisor",
    },
];

/// Demo directory used by `assetflow seed` and the integration tests.
pub struct DirectorySeedDataset;

impl DirectorySeedDataset {
    pub const DEPARTMENTS_SQL: &str = include_str!("../../../config/fixtures/departments.sql");

    /// Loads departments and users. Existing rows are left untouched, so loading twice is safe.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::DEPARTMENTS_SQL)).await?;
        tx.commit().await?;

        let mut users_seeded = Vec::with_capacity(SEED_USERS.len());
        let mut inserted = 0;
        for user in SEED_USERS {
            if register_user(pool, &user.to_new_user(), Some(DEMO_PASSWORD)).await? {
                inserted += 1;
            }
            users_seeded.push(SeedUserInfo {
                id: UserId(user.id),
                name: user.name,
                description: user.description,
            });
        }

        Ok(SeedResult { departments: SEED_DEPARTMENT_IDS.len(), inserted, users_seeded })
    }

    /// Checks that every seeded row is present with the expected chain attributes.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for department_id in SEED_DEPARTMENT_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM department WHERE id = ?1)")
                    .bind(department_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("department-{department_id}"), exists == 1));
        }

        for user in SEED_USERS {
            let matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM directory_user
                     WHERE id = ?1 AND department_id = ?2 AND supervisor_id = ?3
                       AND is_asset_manager = ?4 AND password_hash LIKE '$argon2%'
                 )",
            )
            .bind(user.id)
            .bind(user.department_id)
            .bind(user.supervisor_id)
            .bind(i64::from(user.is_asset_manager))
            .fetch_one(pool)
            .await?;
            checks.push((format!("user-{}", user.name), matches == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedUserContract {
    id: i64,
    name: &'static str,
    department_id: i64,
    title: &'static str,
    supervisor_id: i64,
    is_asset_manager: bool,
    description: &'static str,
}

impl SeedUserContract {
    fn to_new_user(self) -> NewDirectoryUser {
        let supervisor_id =
            if self.supervisor_id == 0 { NO_SUPERVISOR } else { UserId(self.supervisor_id) };
        NewDirectoryUser {
            id: UserId(self.id),
            name: self.name.to_string(),
            department_id: DepartmentId(self.department_id),
            title: self.title.to_string(),
            supervisor_id,
            is_asset_manager: self.is_asset_manager,
        }
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub departments: usize,
    /// Users written by this call; zero when the directory was already seeded.
    pub inserted: usize,
    pub users_seeded: Vec<SeedUserInfo>,
}

#[derive(Debug)]
pub struct SeedUserInfo {
    pub id: UserId,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
