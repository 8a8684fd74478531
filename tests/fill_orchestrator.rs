use std::path::PathBuf;
use std::time::Duration;

use tms_timesheet_bot::{
    config::{Config, Timeouts},
    error::{FillError, FillIssue, OffsetBoundsError, WeekFailure},
    helpers::login::{PollLogin, SignalLogin},
    models::{CellOutcome, Direction, TimesheetRow, WeekId, WeekSpec, Weekday},
    page::{
        ControlRole,
        fake::{FakePage, PageCall},
        selectors,
    },
    service::{FailureStrategy, FillService},
};

fn week(n: u32) -> WeekId {
    WeekId::new(2025, n)
}

fn config() -> Config {
    Config {
        timeouts: Timeouts::instant(),
        ..Config::default()
    }
}

fn rows() -> Vec<TimesheetRow> {
    vec![
        TimesheetRow::with_entries("A", &[(Weekday::Monday, 7.5), (Weekday::Tuesday, 8.0)])
            .unwrap(),
        TimesheetRow::with_entries("B", &[(Weekday::Friday, 1.0)]).unwrap(),
    ]
}

fn page_at(n: u32) -> FakePage {
    FakePage::new(week(n))
        .with_project("A", "Alpha", "01 - Unspecified")
        .with_project("B", "Beta", "01 - Unspecified")
}

fn spec(text: &str) -> WeekSpec {
    WeekSpec::parse(text).unwrap()
}

#[tokio::test]
async fn missing_commit_on_second_week_aborts_before_the_third() {
    let service = FillService::new(Config {
        auto_submit: true,
        ..config()
    });
    let mut page = page_at(48).without_commit_on(week(49));

    let err = service
        .fill(&mut page, &rows(), Some(&spec("48-50")))
        .await
        .unwrap_err();

    match &err {
        FillError::WeekAborted { week: failed, cause } => {
            assert_eq!(*failed, week(49));
            assert!(matches!(cause, WeekFailure::CommitUnavailable { attempts: 3 }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.week(), Some(week(49)));
    assert!(page.calls_during(week(50)).is_empty());
    assert_eq!(page.committed(), &[week(48)]);
    assert_eq!(page.current_week(), week(49));
}

#[tokio::test]
async fn found_and_missing_projects_are_counted() {
    let service = FillService::new(config());
    let mut page = FakePage::new(week(48)).with_project("A", "Alpha", "01");
    let rows = vec![
        TimesheetRow::with_entries("A", &[(Weekday::Monday, 7.5)]).unwrap(),
        TimesheetRow::with_entries("B", &[(Weekday::Monday, 2.0)]).unwrap(),
    ];

    let summary = service
        .fill(&mut page, &rows, Some(&spec("48")))
        .await
        .unwrap();

    assert_eq!(summary.projects_found, 1);
    assert_eq!(summary.projects_not_found, 1);
    assert_eq!(summary.missing_projects, vec!["B".to_string()]);
    assert_eq!(summary.total_cells_filled, 1);
    assert_eq!(summary.total_cells_failed, 0);
    assert_eq!(summary.daily_totals[&Weekday::Monday], 9.5);
    assert_eq!(summary.weeks_processed, vec![week(48)]);
    assert!(summary.weeks_committed.is_empty());
    assert!(summary.has_failures());

    let a = &summary.project_results[0];
    assert_eq!(a.cell_results.len(), 1);
    assert_eq!(a.cell_results[0].outcome, CellOutcome::Success);
    assert_eq!(page.value(week(48), "A", Weekday::Monday), Some("7.5"));
    assert_eq!(summary.project_results[1].error, Some(FillIssue::RowNotFound));
    assert!(page.committed().is_empty());
    assert_eq!(page.clicks(ControlRole::NextWeek), 0);
}

#[tokio::test]
async fn without_a_week_list_only_the_displayed_week_is_filled() {
    let service = FillService::new(config());
    let mut page = page_at(12);

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(summary.weeks_processed, vec![week(12)]);
    assert_eq!(summary.total_cells_filled, 3);
    assert_eq!(page.value(week(12), "A", Weekday::Tuesday), Some("8.0"));
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn skip_week_strategy_continues_past_a_failed_week() {
    let service = FillService::new(Config {
        auto_submit: true,
        failure_strategy: FailureStrategy::SkipWeek,
        ..config()
    });
    let mut page = page_at(48).without_commit_on(week(49));

    let summary = service
        .fill(&mut page, &rows(), Some(&spec("48-50")))
        .await
        .unwrap();

    assert_eq!(summary.weeks_processed, vec![week(48), week(50)]);
    assert_eq!(summary.weeks_committed, vec![week(48), week(50)]);
    assert_eq!(summary.skipped_weeks.len(), 1);
    assert_eq!(summary.skipped_weeks[0].week, week(49));
    assert!(summary.skipped_weeks[0].reason.contains("commit control"));
    assert_eq!(summary.total_projects, 4);
    assert!(summary.has_failures());
}

#[tokio::test]
async fn no_overwrite_keeps_existing_values() {
    let service = FillService::new(Config {
        no_overwrite: true,
        ..config()
    });
    let mut page = page_at(48).with_value(week(48), "A", Weekday::Monday, "3.0");

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(summary.total_cells_skipped, 1);
    assert_eq!(summary.total_cells_filled, 2);
    assert_eq!(page.value(week(48), "A", Weekday::Monday), Some("3.0"));
    assert!(!page
        .calls()
        .iter()
        .any(|(_, call)| matches!(call, PageCall::Write(p, Weekday::Monday, _) if p == "A")));
}

#[tokio::test]
async fn existing_values_are_cleared_then_overwritten() {
    let service = FillService::new(config());
    let mut page = page_at(48).with_value(week(48), "A", Weekday::Monday, "3.0");

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(summary.total_cells_filled, 3);
    assert_eq!(page.value(week(48), "A", Weekday::Monday), Some("7.5"));
    let calls: Vec<_> = page.calls_during(week(48));
    let clear = calls
        .iter()
        .position(|c| **c == PageCall::Clear("A".to_string(), Weekday::Monday))
        .unwrap();
    let write = calls
        .iter()
        .position(|c| **c == PageCall::Write("A".to_string(), Weekday::Monday, "7.5".to_string()))
        .unwrap();
    assert!(clear < write);
}

#[tokio::test]
async fn cell_problems_are_recorded_without_stopping() {
    let service = FillService::new(config());
    let mut page = page_at(48)
        .rejecting_writes("A", Weekday::Monday)
        .without_field("A", Weekday::Tuesday)
        .failing_writes("B", Weekday::Friday);

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(summary.projects_found, 2);
    assert_eq!(summary.total_cells_failed, 3);
    assert_eq!(summary.total_cells_filled, 0);

    let a = &summary.project_results[0];
    assert_eq!(
        a.cell_results[0].error,
        Some(FillIssue::VerificationMismatch {
            weekday: Weekday::Monday
        })
    );
    assert_eq!(
        a.cell_results[1].error,
        Some(FillIssue::FieldNotFound {
            weekday: Weekday::Tuesday
        })
    );
    let b = &summary.project_results[1];
    assert!(matches!(b.cell_results[0].error, Some(FillIssue::Driver { .. })));
}

#[tokio::test]
async fn earlier_target_clicks_previous_week() {
    let service = FillService::new(config());
    let mut page = page_at(50);

    let summary = service
        .fill(&mut page, &rows(), Some(&spec("48")))
        .await
        .unwrap();

    assert_eq!(page.clicks(ControlRole::PreviousWeek), 2);
    assert_eq!(page.clicks(ControlRole::NextWeek), 0);
    assert_eq!(summary.weeks_processed, vec![week(48)]);
    assert_eq!(page.value(week(48), "A", Weekday::Monday), Some("7.5"));
    assert_eq!(page.value(week(50), "A", Weekday::Monday), None);
}

#[tokio::test]
async fn consecutive_weeks_move_one_step_at_a_time() {
    let service = FillService::new(config());
    let mut page = page_at(47);

    service
        .fill(&mut page, &rows(), Some(&spec("50,48,49")))
        .await
        .unwrap();

    assert_eq!(page.clicks(ControlRole::NextWeek), 3);
    for n in 48..=50 {
        assert_eq!(page.value(week(n), "B", Weekday::Friday), Some("1.0"));
    }
    assert_eq!(page.value(week(47), "B", Weekday::Friday), None);
}

#[tokio::test]
async fn target_year_crosses_the_year_boundary() {
    let service = FillService::new(Config {
        year: Some(2026),
        ..config()
    });
    let mut page = page_at(52);

    let summary = service
        .fill(&mut page, &rows(), Some(&spec("1")))
        .await
        .unwrap();

    assert_eq!(page.clicks(ControlRole::NextWeek), 1);
    assert_eq!(summary.weeks_processed, vec![WeekId::new(2026, 1)]);
}

#[tokio::test]
async fn offset_beyond_bounds_fails_before_any_interaction() {
    let mut config = config();
    config.bounds.max_forward = 1;
    let service = FillService::new(config);
    let mut page = page_at(48);

    let err = service
        .fill(&mut page, &rows(), Some(&spec("50")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FillError::WeekAborted {
            cause: WeekFailure::OffsetOutOfBounds(OffsetBoundsError::Forward { offset: 2, max: 1 }),
            ..
        }
    ));
    assert!(page
        .calls()
        .iter()
        .all(|(_, call)| *call == PageCall::DetectWeek));
}

#[tokio::test]
async fn offset_equal_to_the_bound_is_allowed() {
    let mut config = config();
    config.bounds.max_backward = 2;
    let service = FillService::new(config);
    let mut page = page_at(50);

    service
        .fill(&mut page, &rows(), Some(&spec("48")))
        .await
        .unwrap();
    assert_eq!(page.current_week(), week(48));
}

#[tokio::test]
async fn stuck_navigation_is_an_arrival_mismatch() {
    let service = FillService::new(config());
    let mut page = page_at(48).with_stuck_navigation();

    let err = service
        .fill(&mut page, &rows(), Some(&spec("49")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FillError::WeekAborted {
            cause: WeekFailure::ArrivalMismatch { expected, actual },
            ..
        } if expected == week(49) && actual == week(48)
    ));
    assert_eq!(page.writes(), 0);
}

#[tokio::test]
async fn missing_arrow_is_fatal() {
    let service = FillService::new(config());
    let mut page = page_at(48).without_navigation(Direction::Forward);

    let err = service
        .fill(&mut page, &rows(), Some(&spec("49")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FillError::WeekAborted {
            cause: WeekFailure::NavigationControlMissing {
                direction: Direction::Forward
            },
            ..
        }
    ));
}

#[tokio::test]
async fn undetectable_baseline_is_fatal_under_either_strategy() {
    for strategy in [FailureStrategy::AbortBatch, FailureStrategy::SkipWeek] {
        let service = FillService::new(Config {
            failure_strategy: strategy,
            ..config()
        });
        let mut page = page_at(48).with_broken_week_display();

        let err = service
            .fill(&mut page, &rows(), Some(&spec("48")))
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::BaselineUndetected(_)));
        assert_eq!(page.writes(), 0);
    }
}

#[tokio::test]
async fn commit_falls_back_to_alternate_save_controls() {
    let service = FillService::new(Config {
        auto_submit: true,
        ..config()
    });
    let mut page = page_at(48).with_commit_control("button.btn").with_silent_commit();

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(summary.weeks_committed, vec![week(48)]);
    assert_eq!(page.committed(), &[week(48)]);
    // No transition after the save, so the fixed delay stood in for it.
    assert!(page.calls_during(week(48)).contains(&&PageCall::WaitTransition));
    assert_eq!(page.missed_transitions(), 1);
}

#[tokio::test]
async fn promark_runs_after_each_save() {
    let service = FillService::new(Config {
        auto_submit: true,
        submit_after_save: true,
        ..config()
    });
    let mut page = page_at(48);

    let summary = service
        .fill(&mut page, &rows(), Some(&spec("48-49")))
        .await
        .unwrap();

    assert_eq!(page.submitted(), &[week(48), week(49)]);
    assert_eq!(summary.weeks_submitted, vec![week(48), week(49)]);

    let calls = page.calls_during(week(48));
    let save = calls
        .iter()
        .position(|c| **c == PageCall::Click(ControlRole::Commit))
        .unwrap();
    let submit = calls
        .iter()
        .position(|c| **c == PageCall::Click(ControlRole::Submit))
        .unwrap();
    assert!(save < submit);
}

#[tokio::test]
async fn promark_is_not_clicked_unless_asked() {
    let service = FillService::new(Config {
        auto_submit: true,
        ..config()
    });
    let mut page = page_at(48);

    let summary = service.fill(&mut page, &rows(), None).await.unwrap();

    assert_eq!(page.clicks(ControlRole::Submit), 0);
    assert!(summary.weeks_submitted.is_empty());
    assert_eq!(summary.weeks_committed, vec![week(48)]);
}

#[tokio::test]
async fn missing_promark_is_fatal_after_trying_both_locators() {
    let service = FillService::new(Config {
        auto_submit: true,
        submit_after_save: true,
        ..config()
    });
    let mut page = page_at(48).without_submit_on(week(49));

    let err = service
        .fill(&mut page, &rows(), Some(&spec("48-50")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FillError::WeekAborted {
            cause: WeekFailure::SubmitUnavailable { attempts: 2 },
            ..
        }
    ));
    assert_eq!(err.week(), Some(week(49)));
    assert_eq!(page.committed(), &[week(48), week(49)]);
    assert_eq!(page.submitted(), &[week(48)]);
    let submit_checks = page
        .calls_during(week(49))
        .into_iter()
        .filter(|c| **c == PageCall::WaitVisible(ControlRole::Submit))
        .count();
    assert_eq!(submit_checks, 2);
    assert!(page.calls_during(week(50)).is_empty());
}

#[tokio::test]
async fn session_closes_the_page_and_screenshots_on_failure() {
    let shot = PathBuf::from("failure.png");
    let service = FillService::new(Config {
        screenshot_on_error: Some(shot.clone()),
        ..config()
    });
    let login = PollLogin {
        table: selectors::table(),
        interval: Duration::from_millis(1),
        ceiling: Duration::from_millis(5),
    };
    let mut page = page_at(48).with_hidden_table();

    let err = service
        .run_session(&mut page, &login, &rows(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FillError::TableNotVisible));
    assert!(page.is_closed());
    assert!(page
        .calls()
        .iter()
        .any(|(_, call)| *call == PageCall::Screenshot(shot.clone())));
    assert_eq!(page.writes(), 0);
}

#[tokio::test]
async fn session_runs_end_to_end() {
    let service = FillService::new(Config {
        tms_url: "http://tms.test/home".to_string(),
        auto_submit: true,
        ..config()
    });
    let login = SignalLogin::new();
    login.signal();
    let mut page = page_at(48);

    let summary = service
        .run_session(&mut page, &login, &rows(), Some(&spec("48-49")))
        .await
        .unwrap();

    assert_eq!(
        page.calls()[0].1,
        PageCall::Navigate("http://tms.test/home".to_string())
    );
    assert_eq!(summary.weeks_committed, vec![week(48), week(49)]);
    assert_eq!(summary.total_cells_filled, 6);
    assert!(summary.finished_at.is_some());
    assert!(page.is_closed());
    assert!(!page
        .calls()
        .iter()
        .any(|(_, call)| matches!(call, PageCall::Screenshot(_))));
}

#[tokio::test]
async fn collect_projects_lists_the_table() {
    let service = FillService::new(config());
    let login = SignalLogin::new();
    login.signal();
    let mut page = page_at(48);

    let projects = service.collect_projects(&mut page, &login).await.unwrap();

    let numbers: Vec<_> = projects.iter().map(|p| p.project_number.as_str()).collect();
    assert_eq!(numbers, vec!["A", "B"]);
    assert!(page.is_closed());
}
