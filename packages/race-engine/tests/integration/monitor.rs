use ::common::{CompletionRecord, FinishStatus, GuildState, RaceResults, ScoringMode};
use chrono::Duration;
use race_engine::commands::{
    Actor, CommandError, CommandService, NewRace, ServiceError, TeamCommand,
};

use crate::common::{GUILD, RACE, TestApp, fresh_report, race, run, t0, team};

fn seeded(scoring: ScoringMode, teams: Vec<::common::Team>) -> GuildState {
    GuildState {
        races: vec![race(scoring)],
        teams,
        ..Default::default()
    }
}

fn results_key() -> String {
    race(ScoringMode::Best).results_key()
}

mod active_race {
    use super::*;

    #[tokio::test]
    async fn accepts_clean_run_and_publishes_standings() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001", "B#0002"])],
        ))
        .await;
        app.stats.add_run(
            "A#0001",
            run("r1", 10, 300),
            fresh_report("r1", &["A#0001", "B#0002"], 300),
        );

        let summary = app.pass_at(30).await;
        assert_eq!(summary.polled, 1);
        assert_eq!(summary.teams_updated, 1);

        let state = app.state().await;
        let record = state.results[&results_key()].get("Alpha").unwrap();
        assert_eq!(record.time, Some(300.0));
        assert_eq!(record.completions, 1);
        assert_eq!(record.team_members, ["A#0001", "B#0002"]);

        let boards = app.publisher.leaderboards();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].race, RACE);
        assert_eq!(boards[0].ranked[0].team, "Alpha");
    }

    #[tokio::test]
    async fn run_with_extra_player_leaves_time_unchanged() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001", "B#0002"])],
        ))
        .await;
        app.stats.add_run(
            "A#0001",
            run("r1", 10, 300),
            fresh_report("r1", &["A#0001", "B#0002"], 300),
        );
        app.pass_at(20).await;

        app.stats.add_run(
            "A#0001",
            run("r2", 25, 250),
            fresh_report("r2", &["A#0001", "B#0002", "C#0003"], 250),
        );
        app.pass_at(40).await;

        let state = app.state().await;
        let record = state.results[&results_key()].get("Alpha").unwrap();
        assert_eq!(record.time, Some(300.0));
        assert_eq!(record.completions, 1);
        assert!(!record.processed_instances.contains("r2"));
    }

    #[tokio::test]
    async fn repeated_passes_are_idempotent() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Average,
            vec![team("Alpha", &["A#0001"])],
        ))
        .await;
        for (id, minute, secs) in [("r1", 5, 400), ("r2", 15, 350)] {
            app.stats
                .add_run("A#0001", run(id, minute, secs), fresh_report(id, &["A#0001"], secs));
        }

        app.pass_at(30).await;
        let first = app.state().await;
        app.pass_at(31).await;
        let second = app.state().await;

        assert_eq!(first, second);
        assert_eq!(app.stats.report_calls().len(), 2);
        assert_eq!(first.results[&results_key()].get("Alpha").unwrap().time, Some(375.0));
    }

    #[tokio::test]
    async fn roster_change_revalidates_previous_runs() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001", "B#0002"])],
        ))
        .await;
        app.stats.add_run(
            "A#0001",
            run("r1", 10, 300),
            fresh_report("r1", &["A#0001", "B#0002"], 300),
        );
        app.pass_at(20).await;

        app.edit(|state| {
            state
                .team_mut("Alpha")
                .unwrap()
                .members
                .push("C#0003".into())
        })
        .await;
        app.pass_at(30).await;

        let state = app.state().await;
        let record = state.results[&results_key()].get("Alpha").unwrap();
        assert_eq!(record.time, None);
        assert!(record.processed_instances.is_empty());
        assert_eq!(record.team_members, ["A#0001", "B#0002", "C#0003"]);
        assert_eq!(app.stats.report_calls(), ["r1", "r1"]);
    }

    #[tokio::test]
    async fn failing_team_does_not_block_others() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001"]), team("Bravo", &["B#0002"])],
        ))
        .await;
        app.stats
            .add_run("A#0001", run("a1", 10, 500), fresh_report("a1", &["A#0001"], 500));
        app.stats
            .add_run("B#0002", run("b1", 10, 450), fresh_report("b1", &["B#0002"], 450));
        app.stats.fail_report("a1");

        let summary = app.pass_at(30).await;
        assert_eq!(summary.team_failures, 1);
        assert_eq!(summary.teams_updated, 1);

        let state = app.state().await;
        let results = &state.results[&results_key()];
        assert!(results.get("Alpha").is_none());
        assert_eq!(results.get("Bravo").unwrap().time, Some(450.0));
    }

    #[tokio::test]
    async fn team_without_roster_is_skipped() {
        let mut empty = team("Ghost", &[]);
        empty.captain.clear();
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![empty, team("Alpha", &["A#0001"])],
        ))
        .await;

        let summary = app.pass_at(30).await;
        assert_eq!(summary.team_failures, 1);
        assert_eq!(summary.teams_updated, 1);
        assert_eq!(summary.race_failures, 0);
    }
}

mod race_window {
    use super::*;

    #[tokio::test]
    async fn pending_race_is_untouched() {
        let app = TestApp::with_state(seeded(ScoringMode::Best, vec![team("Alpha", &["A#0001"])])).await;
        app.stats
            .add_run("A#0001", run("r1", 10, 300), fresh_report("r1", &["A#0001"], 300));

        let summary = app.pass_at(-5).await;
        assert_eq!(summary.pending, 1);
        assert!(app.stats.report_calls().is_empty());
        assert!(app.publisher.events().is_empty());
        assert!(app.state().await.results.is_empty());
    }

    #[tokio::test]
    async fn runs_outside_window_are_ignored() {
        let app = TestApp::with_state(seeded(ScoringMode::Best, vec![team("Alpha", &["A#0001"])])).await;
        app.stats
            .add_run("A#0001", run("before", -30, 200), fresh_report("before", &["A#0001"], 200));

        app.pass_at(30).await;
        let state = app.state().await;
        assert_eq!(state.results[&results_key()].get("Alpha").unwrap().time, None);
        assert!(app.stats.report_calls().is_empty());
    }
}

mod race_end {
    use super::*;

    #[tokio::test]
    async fn concludes_race_once() {
        let app = TestApp::with_state(seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001"]), team("Bravo", &["B#0002"])],
        ))
        .await;
        app.stats
            .add_run("A#0001", run("a1", 10, 500), fresh_report("a1", &["A#0001"], 500));
        app.pass_at(30).await;

        let summary = app.pass_at(61).await;
        assert_eq!(summary.concluded, 1);

        let state = app.state().await;
        assert!(state.races.is_empty());
        assert_eq!(state.teams.len(), 2);
        let results = &state.results[&results_key()];
        assert!(results.is_finalized());
        assert!(!results.get("Alpha").unwrap().is_dnf());
        assert!(results.get("Bravo").unwrap().is_dnf());

        let winners = app.publisher.winners();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].podium.len(), 1);
        assert_eq!(winners[0].podium[0].team, "Alpha");
        assert_eq!(winners[0].podium[0].medal, "🥇");
        assert_eq!(app.publisher.locked_teams(), ["Alpha", "Bravo"]);

        let second = app.pass_at(62).await;
        assert_eq!(second.concluded, 0);
        assert_eq!(second.race_failures, 0);
        assert_eq!(app.publisher.winners().len(), 1);
        assert_eq!(app.state().await, state);
    }

    #[tokio::test]
    async fn average_mode_with_two_runs_is_dnf() {
        let app = TestApp::with_state(seeded(ScoringMode::Average, vec![team("Duo", &["A#0001"])])).await;
        for (id, minute, secs) in [("r1", 5, 400), ("r2", 15, 350)] {
            app.stats
                .add_run("A#0001", run(id, minute, secs), fresh_report(id, &["A#0001"], secs));
        }
        app.pass_at(30).await;
        app.pass_at(90).await;

        let state = app.state().await;
        let record = state.results[&results_key()].get("Duo").unwrap();
        assert_eq!(record.status, Some(FinishStatus::Dnf));
        assert_eq!(record.time, Some(375.0));
        assert!(app.publisher.winners().is_empty());
        assert_eq!(app.publisher.locked_teams(), ["Duo"]);
    }

    #[tokio::test]
    async fn lock_notice_names_grace_period() {
        let app = TestApp::with_state(seeded(ScoringMode::Best, vec![team("Alpha", &["A#0001"])])).await;
        app.pass_at(120).await;

        let events = app.publisher.events();
        let message = events
            .iter()
            .find_map(|e| match e {
                crate::common::Published::Locked { message, .. } => Some(message.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            message,
            format!("**{RACE}** has ended. This channel has been locked and will be deleted in 2 days.")
        );
    }

    #[tokio::test]
    async fn frozen_results_with_listed_race_finish_removal() {
        let mut frozen = RaceResults {
            finalized_at: Some(t0() + Duration::minutes(60)),
            ..Default::default()
        };
        frozen.upsert(
            "Alpha",
            CompletionRecord {
                time: Some(300.0),
                completions: 1,
                all_times: vec![300],
                ..Default::default()
            },
        );
        frozen.upsert("Bravo", CompletionRecord::dnf());

        let mut state = seeded(
            ScoringMode::Best,
            vec![team("Alpha", &["A#0001"]), team("Bravo", &["B#0002"])],
        );
        state.results.insert(results_key(), frozen.clone());
        let app = TestApp::with_state(state).await;
        app.stats
            .add_run("B#0002", run("b1", 20, 280), fresh_report("b1", &["B#0002"], 280));

        let summary = app.pass_at(61).await;
        assert_eq!(summary.concluded, 1);
        assert_eq!(summary.polled, 0);
        assert_eq!(summary.race_failures, 0);

        let state = app.state().await;
        assert!(state.races.is_empty());
        assert_eq!(state.results[&results_key()], frozen);
        assert_eq!(app.publisher.winners()[0].podium[0].team, "Alpha");
        assert_eq!(app.publisher.locked_teams(), ["Alpha", "Bravo"]);
        assert!(app.stats.report_calls().is_empty());
    }

    #[tokio::test]
    async fn concluded_name_cannot_be_reused() {
        let app = TestApp::with_state(seeded(ScoringMode::Best, vec![team("Alpha", &["A#0001"])])).await;
        app.stats
            .add_run("A#0001", run("a1", 10, 500), fresh_report("a1", &["A#0001"], 500));
        app.pass_at(30).await;
        app.pass_at(61).await;

        let svc = CommandService::new(app.store.clone(), app.publisher.clone());
        let admin = Actor::admin("Admin#0001");
        let rerun = |name: &str| NewRace {
            name: Some(name.into()),
            dungeon: "Duality".into(),
            start: (t0() + Duration::minutes(70)).fixed_offset(),
            end: (t0() + Duration::minutes(180)).fixed_offset(),
            scoring: "best".into(),
        };

        let err = svc.create_race(GUILD, &admin, rerun(RACE)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Command(CommandError::RaceConcluded(ref name)) if name == RACE
        ));
        assert!(app.state().await.races.is_empty());

        let second = svc.create_race(GUILD, &admin, rerun("Duality Rematch")).await.unwrap();
        svc.team(
            GUILD,
            &Actor::player("C#0003"),
            TeamCommand::Create {
                race: second.name.clone(),
                name: "Charlie".into(),
                members: vec![],
            },
        )
        .await
        .unwrap();
        app.stats
            .add_run("C#0003", run("c1", 80, 420), fresh_report("c1", &["C#0003"], 420));

        let summary = app.pass_at(90).await;
        assert_eq!(summary.polled, 1);
        assert_eq!(summary.concluded, 0);

        let state = app.state().await;
        let charlie = state.results[&second.results_key()].get("Charlie").unwrap();
        assert_eq!(charlie.time, Some(420.0));
        assert_eq!(app.publisher.winners().len(), 1);
    }
}
