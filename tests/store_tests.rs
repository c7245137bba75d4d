//! Integration tests for the store: templates, players and task queries.

use chore_ledger::db::Database;
use chore_ledger::error::ErrorCode;
use chore_ledger::generator::InstanceGenerator;
use chore_ledger::lifecycle::TaskLifecycle;
use chore_ledger::types::{
    Difficulty, NewTemplate, TaskFilter, TaskKind, TaskStatus, TemplateUpdate, WeekdaySet,
};
use chrono::{NaiveDate, NaiveDateTime};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

fn new_daily(title: &str, days: &[u8]) -> NewTemplate {
    NewTemplate {
        title: title.to_string(),
        description: "Every day".into(),
        difficulty: Difficulty::Easy,
        kind: TaskKind::Daily,
        reward: 5,
        repeat_days: WeekdaySet::from_days(days.iter().copied()).unwrap(),
    }
}

fn new_limited(title: &str) -> NewTemplate {
    NewTemplate {
        title: title.to_string(),
        description: String::new(),
        difficulty: Difficulty::Hard,
        kind: TaskKind::Limited,
        reward: 30,
        repeat_days: WeekdaySet::empty(),
    }
}

/// Fixed-width `YYYY-MM-DD HH:MM:SS`.
fn is_wire_timestamp(s: &str) -> bool {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok() && s.len() == 19
}

mod template_tests {
    use super::*;

    #[test]
    fn create_and_get_template() {
        let db = setup_db();

        let id = db.create_template(&new_daily("Dishes", &[1, 3, 5])).unwrap();
        let template = db.get_template(id).unwrap().expect("Template should exist");

        assert_eq!(template.title, "Dishes");
        assert_eq!(template.kind, TaskKind::Daily);
        assert_eq!(template.reward, 5);
        assert_eq!(template.repeat_days.days().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(is_wire_timestamp(&template.created_at));
        assert_eq!(template.created_at, template.updated_at);
    }

    #[test]
    fn get_missing_template_is_none() {
        let db = setup_db();
        assert!(db.get_template(77).unwrap().is_none());
    }

    #[test]
    fn list_templates_filters_by_kind() {
        let db = setup_db();
        db.create_template(&new_daily("Dishes", &[1])).unwrap();
        db.create_template(&new_daily("Laundry", &[6])).unwrap();
        db.create_template(&new_limited("Garage")).unwrap();

        assert_eq!(db.list_templates(None).unwrap().len(), 3);

        let daily = db.list_templates(Some(TaskKind::Daily)).unwrap();
        assert_eq!(daily.len(), 2);
        assert!(daily.iter().all(|t| t.kind == TaskKind::Daily));

        let limited = db.list_templates(Some(TaskKind::Limited)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title, "Garage");
    }

    #[test]
    fn update_changes_only_given_fields() {
        let db = setup_db();
        let id = db.create_template(&new_daily("Dishes", &[1])).unwrap();

        let updated = db
            .update_template(
                id,
                &TemplateUpdate {
                    reward: Some(8),
                    repeat_days: Some(WeekdaySet::from_days([2, 4]).unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Dishes");
        assert_eq!(updated.description, "Every day");
        assert_eq!(updated.reward, 8);
        assert_eq!(updated.repeat_days.to_string(), "2,4");
        assert!(is_wire_timestamp(&updated.updated_at));
    }

    #[test]
    fn update_rejects_invalid_values() {
        let db = setup_db();
        let id = db.create_template(&new_daily("Dishes", &[1])).unwrap();

        let err = db
            .update_template(
                id,
                &TemplateUpdate {
                    reward: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let err = db
            .update_template(
                id,
                &TemplateUpdate {
                    repeat_days: Some(WeekdaySet::empty()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        assert_eq!(db.get_template(id).unwrap().unwrap().reward, 5);
    }

    #[test]
    fn update_missing_template_is_not_found() {
        let db = setup_db();
        let err = db
            .update_template(12, &TemplateUpdate::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn delete_template_twice() {
        let db = setup_db();
        let id = db.create_template(&new_limited("Garage")).unwrap();

        db.delete_template(id).unwrap();
        assert!(db.get_template(id).unwrap().is_none());

        let err = db.delete_template(id).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn store_rejects_non_positive_reward() {
        let db = setup_db();
        let mut template = new_limited("Free work");
        template.reward = 0;

        assert_eq!(template.validate().unwrap_err().code(), ErrorCode::InvalidInput);
        let err = db.create_template(&template).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PersistenceFailure);
    }
}

mod player_tests {
    use super::*;

    #[test]
    fn ensure_player_seeds_once() {
        let db = setup_db();

        let first = db.ensure_player("Alex", 10).unwrap();
        assert_eq!(first.name, "Alex");
        assert_eq!(first.balance, 10);

        let again = db.ensure_player("Someone else", 99).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.name, "Alex");
        assert_eq!(again.balance, 10);
    }

    #[test]
    fn primary_player_is_lowest_id() {
        let db = setup_db();
        assert!(db.primary_player().unwrap().is_none());

        let first = db.create_player("First", 0).unwrap();
        db.create_player("Second", 0).unwrap();

        assert_eq!(db.primary_player().unwrap().unwrap().id, first.id);
    }
}

mod task_query_tests {
    use super::*;

    /// Daily instance on Monday 2025-01-06, a limited task open all of
    /// January and a limited task opening in March.
    fn seed(db: &Database) -> (i64, i64, i64) {
        let generator = InstanceGenerator::new(db.clone());
        let reference = at(2025, 1, 5, 12, 0, 0);

        let daily = db.create_template(&new_daily("Dishes", &[1])).unwrap();
        let daily_task = generator
            .ensure_instance_at(daily, None, None, reference)
            .unwrap()
            .created()
            .unwrap();

        let open = db.create_template(&new_limited("Garage")).unwrap();
        let open_task = generator
            .ensure_instance_at(
                open,
                Some("2025-01-31 23:59:59"),
                Some("2025-01-01 00:00:00"),
                reference,
            )
            .unwrap()
            .created()
            .unwrap();

        let later = db.create_template(&new_limited("Attic")).unwrap();
        let later_task = generator
            .ensure_instance_at(
                later,
                Some("2025-03-31 23:59:59"),
                Some("2025-03-01 00:00:00"),
                reference,
            )
            .unwrap()
            .created()
            .unwrap();

        (daily_task, open_task, later_task)
    }

    #[test]
    fn board_splits_claimable_upcoming_and_in_progress() {
        let db = setup_db();
        let kid = db.create_player("Kid", 0).unwrap();
        let (daily_task, open_task, later_task) = seed(&db);

        let monday = at(2025, 1, 6, 9, 0, 0);
        TaskLifecycle::new(db.clone())
            .claim_at(open_task, kid.id, monday)
            .unwrap();

        let board = db.task_board(kid.id, "2025-01-06 09:00:00").unwrap();
        assert_eq!(board.player.id, kid.id);

        let claimable: Vec<i64> = board.claimable.iter().map(|t| t.id).collect();
        assert_eq!(claimable, vec![daily_task]);

        let upcoming: Vec<i64> = board.upcoming.iter().map(|t| t.id).collect();
        assert_eq!(upcoming, vec![later_task]);

        let in_progress: Vec<i64> = board.in_progress.iter().map(|t| t.id).collect();
        assert_eq!(in_progress, vec![open_task]);
    }

    #[test]
    fn daily_instance_is_upcoming_before_its_day() {
        let db = setup_db();
        let kid = db.create_player("Kid", 0).unwrap();
        let (daily_task, _, _) = seed(&db);

        let board = db.task_board(kid.id, "2025-01-05 12:00:00").unwrap();
        assert!(board.upcoming.iter().any(|t| t.id == daily_task));
        assert!(board.claimable.iter().all(|t| t.id != daily_task));
    }

    #[test]
    fn board_for_unknown_player_is_not_found() {
        let db = setup_db();
        let err = db.task_board(5, "2025-01-06 09:00:00").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn list_tasks_applies_every_filter() {
        let db = setup_db();
        let kid = db.create_player("Kid", 0).unwrap();
        let (daily_task, open_task, later_task) = seed(&db);
        TaskLifecycle::new(db.clone())
            .claim_at(open_task, kid.id, at(2025, 1, 6, 9, 0, 0))
            .unwrap();

        assert_eq!(db.list_tasks(&TaskFilter::default()).unwrap().len(), 3);

        let available = db
            .list_tasks(&TaskFilter::default().with_status(TaskStatus::Available))
            .unwrap();
        let mut ids: Vec<i64> = available.iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![daily_task, later_task]);

        let mine = db
            .list_tasks(&TaskFilter::default().owned_by(kid.id))
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, open_task);

        let daily_template = db.get_task(daily_task).unwrap().unwrap().template_id.unwrap();
        let by_template = db
            .list_tasks(
                &TaskFilter::default()
                    .from_template(daily_template)
                    .with_status(TaskStatus::Available)
                    .with_status(TaskStatus::Claimed),
            )
            .unwrap();
        assert_eq!(by_template.len(), 1);
        assert_eq!(by_template[0].id, daily_task);
    }

    #[test]
    fn delete_task_removes_row_and_history() {
        let db = setup_db();
        let (daily_task, _, _) = seed(&db);
        assert_eq!(db.task_history(daily_task).unwrap().len(), 1);

        db.delete_task(daily_task).unwrap();
        assert!(db.get_task(daily_task).unwrap().is_none());
        assert!(db.task_history(daily_task).unwrap().is_empty());

        let err = db.delete_task(daily_task).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}

mod file_store_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        let template_id = {
            let db = Database::open(&path).unwrap();
            db.ensure_player("Alex", 0).unwrap();
            db.create_template(&new_daily("Dishes", &[0, 6])).unwrap()
        };

        // Reopening runs migrations again; they must be a no-op.
        let db = Database::open(&path).unwrap();
        let template = db.get_template(template_id).unwrap().unwrap();
        assert_eq!(template.repeat_days.to_string(), "0,6");
        assert_eq!(db.primary_player().unwrap().unwrap().name, "Alex");
    }
}
