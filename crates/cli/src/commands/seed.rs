use assetflow_db::fixtures::DEMO_PASSWORD;
use assetflow_db::DirectorySeedDataset;
use serde_json::json;

use crate::commands::{execute, CommandFailure, CommandResult, CommandSuccess, GlobalOptions};

const EXIT_SEED: u8 = 6;

pub fn run(options: &GlobalOptions) -> CommandResult {
    execute("seed", options, |runtime| async move {
        let seeded = DirectorySeedDataset::load(&runtime.pool)
            .await
            .map_err(|error| CommandFailure::new("seed_execution", error.to_string(), EXIT_SEED))?;

        let verification = DirectorySeedDataset::verify(&runtime.pool).await.map_err(|error| {
            CommandFailure::new("seed_verification", error.to_string(), EXIT_SEED)
        })?;
        if !verification.all_present {
            return Err(CommandFailure::new(
                "seed_verification",
                verification_message(&verification.checks),
                EXIT_SEED,
            ));
        }

        let users: Vec<_> = seeded
            .users_seeded
            .iter()
            .map(|user| json!({ "id": user.id, "name": user.name, "role": user.description }))
            .collect();
        Ok(CommandSuccess::new(
            format!(
                "directory seeded: {} departments, {} users ({} new)",
                seeded.departments,
                seeded.users_seeded.len(),
                seeded.inserted
            ),
            json!({
                "departments": seeded.departments,
                "inserted_users": seeded.inserted,
                "users": users,
                "demo_password": DEMO_PASSWORD,
            }),
        ))
    })
}

fn verification_message(checks: &[(String, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = vec![
            ("department-1".to_string(), true),
            ("user-riley.requester".to_string(), false),
            ("user-jo.selflead".to_string(), false),
        ];

        assert_eq!(
            verification_message(&checks),
            "Seed verification failed for checks: user-riley.requester, user-jo.selflead"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = vec![("department-1".to_string(), true)];

        assert_eq!(verification_message(&checks), "Some seed data failed to load");
    }
}
