use quizsync::bank::SampleQuestionBank;
use quizsync::client::{ClientSession, RenderEvent};
use quizsync::config::QuizConfig;
use quizsync::protocol::{ClientMessage, ServerMessage};
use quizsync::reveal::RevealOutcome;
use quizsync::signal::LeaderboardTrigger;
use quizsync::state::AppState;
use quizsync::types::{AdvancePolicy, LockTrigger, PlayerId, Role, RoundPhase};
use quizsync::ws::handlers::handle_message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn new_state(policy: AdvancePolicy, questions: usize) -> Arc<AppState> {
    let mut set = SampleQuestionBank::sample_set();
    set.questions.truncate(questions);
    let config = QuizConfig {
        advance_policy: policy,
        ..QuizConfig::default()
    };
    Arc::new(AppState::new(config, set))
}

async fn join(state: &Arc<AppState>, nickname: &str) -> Option<PlayerId> {
    let mut bound = None;
    let result = handle_message(
        ClientMessage::Join {
            nickname: nickname.to_string(),
        },
        &Role::Player,
        &mut bound,
        state,
    )
    .await;
    assert!(matches!(result, Some(ServerMessage::Joined { .. })));
    bound
}

async fn submit(state: &Arc<AppState>, bound: &mut Option<PlayerId>, round: u32, option: usize) {
    let result = handle_message(
        ClientMessage::SubmitAnswer { round, option },
        &Role::Player,
        bound,
        state,
    )
    .await;
    assert!(
        matches!(result, Some(ServerMessage::AnswerAccepted { .. })),
        "submit failed: {:?}",
        result
    );
}

async fn host(state: &Arc<AppState>, msg: ClientMessage) -> Option<ServerMessage> {
    let mut bound = None;
    handle_message(msg, &Role::Host, &mut bound, state).await
}

/// Let spawned leaderboard waits run
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// End-to-end flow for a two-question quiz with host-driven advancement
#[tokio::test(start_paused = true)]
async fn test_full_quiz_flow() {
    let state = new_state(AdvancePolicy::Host, 2);
    let mut events = state.broadcast.subscribe();

    let mut alice = join(&state, "Alice").await;
    let mut bob = join(&state, "Bob").await;
    let mut alice_rx = state.attach(alice.as_ref().unwrap()).await;
    let mut bob_rx = state.attach(bob.as_ref().unwrap()).await;

    assert!(host(&state, ClientMessage::HostStartGame).await.is_none());
    assert_eq!(state.round_view().await.phase, RoundPhase::Active);

    // Round 0: both answer, Alice correctly
    submit(&state, &mut alice, 0, 1).await;
    submit(&state, &mut bob, 0, 0).await;
    settle().await;

    let msgs = drain(&mut events);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMessage::Locked {
            round: 0,
            trigger: LockTrigger::AllAnswered
        }
    )));
    let leaderboard = msgs.iter().find_map(|m| match m {
        ServerMessage::Leaderboard { round: 0, rows, trigger } => Some((rows.clone(), *trigger)),
        _ => None,
    });
    let (rows, trigger) = leaderboard.expect("leaderboard for round 0");
    assert_eq!(trigger, LeaderboardTrigger::ScoresChanged);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].nickname, "Alice");
    assert_eq!(rows[0].score, 1);
    assert_eq!(rows[1].score, 0);

    for (rx, expected) in [
        (&mut alice_rx, RevealOutcome::Correct),
        (&mut bob_rx, RevealOutcome::Wrong),
    ] {
        let sent: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(sent.len(), 1);
        let ServerMessage::Reveal { reveal } = &sent[0] else {
            panic!("Expected Reveal, got {:?}", sent[0]);
        };
        assert_eq!(reveal.outcome(), expected);
    }

    // Index advances only when the host opens the gate
    assert_eq!(state.round_view().await.index, 0);
    assert!(host(&state, ClientMessage::HostNext).await.is_none());
    let view = state.round_view().await;
    assert_eq!(view.index, 1);
    assert_eq!(view.phase, RoundPhase::Active);
    assert_eq!(view.answered, 0);

    // Round 1: nobody answers, the timer decides
    state.tick(Duration::from_secs(61)).await;
    let msgs = drain(&mut events);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMessage::Locked {
            round: 1,
            trigger: LockTrigger::TimerExpired
        }
    )));
    assert_eq!(state.round_view().await.phase, RoundPhase::LeaderboardWait);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    let msgs = drain(&mut events);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMessage::Leaderboard {
            round: 1,
            trigger: LeaderboardTrigger::TimedOut,
            ..
        }
    )));

    assert!(host(&state, ClientMessage::HostNext).await.is_none());
    assert_eq!(state.round_view().await.phase, RoundPhase::Finished);
    let msgs = drain(&mut events);
    let final_rows = msgs
        .iter()
        .find_map(|m| match m {
            ServerMessage::GameOver { rows } => Some(rows.clone()),
            _ => None,
        })
        .expect("GameOver after the last question");
    assert_eq!(final_rows.len(), 2);
    assert_eq!(final_rows[0].score, 1);

    // Nothing is accepted after the end
    let result = host(&state, ClientMessage::HostNext).await;
    assert!(matches!(result, Some(ServerMessage::Error { code, .. }) if code == "FINISHED"));
}

/// Clients drive the ready gate by acknowledging their rendered leaderboard
#[tokio::test(start_paused = true)]
async fn test_all_ready_flow_with_client_sessions() {
    let state = new_state(AdvancePolicy::AllReady, 3);
    let mut events = state.broadcast.subscribe();
    let mut scores_rx = state.scores.read().await.subscribe();

    let mut alice = join(&state, "Alice").await;
    let mut bob = join(&state, "Bob").await;
    let alice_id = alice.clone().unwrap();
    let mut alice_rx = state.attach(&alice_id).await;

    let mut session = ClientSession::new(state.config.leaderboard_timeout);
    session.apply(state.welcome(Role::Player).await);
    session.apply(ServerMessage::Joined {
        player: state.get_player(&alice_id).await.unwrap(),
    });

    host(&state, ClientMessage::HostStartGame).await;
    for msg in drain(&mut events) {
        session.apply(msg);
    }
    assert_eq!(session.phase(), RoundPhase::Active);
    assert!(session.question().is_some());

    submit(&state, &mut alice, 0, 1).await;
    submit(&state, &mut bob, 0, 1).await;

    // Reveal reaches the client before the score deltas do
    let reveal = alice_rx.try_recv().expect("reveal for Alice");
    let update = session.apply(reveal);
    assert_eq!(update.start_wait, Some(0));
    let wait = session.leaderboard_wait();
    while let Ok(delta) = scores_rx.try_recv() {
        session.apply(ServerMessage::ScoreChanged { delta });
    }
    assert_eq!(wait.await, LeaderboardTrigger::ScoresChanged);

    let rendered = session
        .render_leaderboard(0, LeaderboardTrigger::ScoresChanged)
        .expect("first render");
    match rendered {
        RenderEvent::Leaderboard { rows, .. } => {
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().all(|r| r.score == 1));
        }
        other => panic!("Expected leaderboard, got {:?}", other),
    }

    settle().await;
    assert_eq!(state.round_view().await.phase, RoundPhase::LeaderboardShown);

    // One acknowledgement is not enough
    handle_message(ClientMessage::Ready { round: 0 }, &Role::Player, &mut alice, &state).await;
    assert_eq!(state.round_view().await.index, 0);

    handle_message(ClientMessage::Ready { round: 0 }, &Role::Player, &mut bob, &state).await;
    let view = state.round_view().await;
    assert_eq!(view.index, 1);
    assert_eq!(view.phase, RoundPhase::Active);
}

/// A player disconnecting mid-round must not stall completeness
#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_round() {
    let state = new_state(AdvancePolicy::Host, 5);
    let mut alice = join(&state, "Alice").await;
    let mut bob = join(&state, "Bob").await;
    let bob_id = bob.clone().unwrap();

    host(&state, ClientMessage::HostStartGame).await;
    submit(&state, &mut alice, 0, 1).await;
    assert_eq!(state.round_view().await.answered, 1);
    assert_eq!(state.round_view().await.phase, RoundPhase::Active);

    handle_message(ClientMessage::Leave, &Role::Player, &mut bob, &state).await;
    settle().await;

    let view = state.round_view().await;
    assert_eq!(view.players, 1);
    assert_eq!(view.phase, RoundPhase::LeaderboardShown);

    // Departed players stay on the leaderboard
    let rows = state.leaderboard().await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r.player_id == bob_id));
}

#[tokio::test]
async fn test_late_join_rejected() {
    let state = new_state(AdvancePolicy::Host, 5);
    join(&state, "Alice").await;
    host(&state, ClientMessage::HostStartGame).await;

    let mut bound = None;
    let result = handle_message(
        ClientMessage::Join {
            nickname: "Late".to_string(),
        },
        &Role::Player,
        &mut bound,
        &state,
    )
    .await;
    assert!(matches!(result, Some(ServerMessage::Error { code, .. }) if code == "NOT_ACCEPTING"));
    assert!(bound.is_none());
}
