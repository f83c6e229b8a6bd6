//! Turn orchestration integration tests
//!
//! Exercises the orchestrator and the in-process transport against
//! counting fakes, without network access.

use std::sync::Arc;
use std::time::Duration;

use professora::{DirectTransport, Error, FailureKind, SYSTEM_PROMPT, Session, Transport, TurnOrchestrator};

mod common;
use common::{FakeInference, FakeSynthesizer, audio_for, orchestrator};

const GREETING_REPLY: &str = "Oi! Tudo bem? I'm doing great, thanks for asking!";

#[tokio::test]
async fn test_greeting_turn_is_spoken_and_recorded() {
    let inference = FakeInference::replying(GREETING_REPLY);
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);
    let mut session = Session::new("learner-1");

    let reply = orch
        .process_and_record(&mut session, "Hello, how are you?")
        .await
        .unwrap();

    assert_eq!(reply.reply_text, GREETING_REPLY);
    assert_eq!(reply.audio, audio_for(GREETING_REPLY));

    assert_eq!(inference.calls(), 1);
    assert_eq!(synth.calls(), 1);
    assert_eq!(synth.texts(), vec![GREETING_REPLY.to_string()]);

    assert_eq!(session.len(), 1);
    let turn = &session.turns()[0];
    assert_eq!(turn.input_text, "Hello, how are you?");
    assert_eq!(turn.reply_text, GREETING_REPLY);
    assert_eq!(turn.audio.as_deref(), Some(audio_for(GREETING_REPLY).as_slice()));
}

#[tokio::test]
async fn test_whitespace_input_calls_nothing() {
    let inference = FakeInference::replying(GREETING_REPLY);
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);
    let mut session = Session::new("learner-1");

    for input in ["", "   ", "\n\t "] {
        let err = orch.process_and_record(&mut session, input).await.unwrap_err();
        assert!(matches!(err, Error::EmptyInput), "unexpected error: {err:?}");
    }

    assert_eq!(inference.calls(), 0);
    assert_eq!(synth.calls(), 0);
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_throttled_inference_skips_synthesis() {
    let inference = FakeInference::failing(FailureKind::Throttled);
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);
    let mut session = Session::new("learner-1");

    let err = orch.process_and_record(&mut session, "Olá").await.unwrap_err();

    match err {
        Error::Inference(failure) => assert_eq!(failure.kind, FailureKind::Throttled),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(inference.calls(), 1);
    assert_eq!(synth.calls(), 0);
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_synthesis_failure_keeps_reply_text() {
    let inference = FakeInference::replying(GREETING_REPLY);
    let synth = FakeSynthesizer::failing(FailureKind::Unavailable);
    let orch = orchestrator(&inference, &synth);
    let mut session = Session::new("learner-1");

    let err = orch
        .process_and_record(&mut session, "Hello, how are you?")
        .await
        .unwrap_err();

    assert_eq!(err.reply_text(), Some(GREETING_REPLY));
    assert_eq!(err.code(), "synthesis_failed");
    assert_eq!(synth.calls(), 1);

    // Text-only turn so the reply stays visible
    assert_eq!(session.len(), 1);
    assert_eq!(session.turns()[0].reply_text, GREETING_REPLY);
    assert!(!session.turns()[0].has_audio());
}

#[tokio::test]
async fn test_turns_are_recorded_in_order() {
    let inference = FakeInference::replying("Muito bem!");
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);
    let mut session = Session::new("learner-1");

    for input in ["um", "dois", "três"] {
        orch.process_and_record(&mut session, input).await.unwrap();
    }

    let inputs: Vec<&str> = session.turns().iter().map(|t| t.input_text.as_str()).collect();
    assert_eq!(inputs, ["um", "dois", "três"]);
    assert!(
        session
            .turns()
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at)
    );

    let recent: Vec<&str> = session.recent(2).iter().map(|t| t.input_text.as_str()).collect();
    assert_eq!(recent, ["dois", "três"]);
}

#[tokio::test]
async fn test_every_call_uses_the_tutor_prompt() {
    let inference = FakeInference::replying("Oi!");
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);

    orch.process_turn("  Bom dia  ").await.unwrap();

    assert_eq!(inference.user_texts(), vec!["Bom dia".to_string()]);
    assert!(SYSTEM_PROMPT.contains("Portuguese"));
}

#[tokio::test]
async fn test_inference_deadline_is_a_timeout_failure() {
    let inference = FakeInference::slow("tarde demais", Duration::from_secs(30));
    let synth = FakeSynthesizer::ok();
    let orch = TurnOrchestrator::new(inference.clone(), synth.clone())
        .with_timeouts(Duration::from_millis(20), Duration::from_secs(1));

    let err = orch.process_turn("Olá").await.unwrap_err();

    match err {
        Error::Inference(failure) => assert_eq!(failure.kind, FailureKind::Timeout),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(synth.calls(), 0);
}

#[tokio::test]
async fn test_sessions_are_independent_under_concurrency() {
    let inference = FakeInference::slow("Oi!", Duration::from_millis(50));
    let synth = FakeSynthesizer::ok();
    let orch = orchestrator(&inference, &synth);

    let mut a = Session::new("a");
    let mut b = Session::new("b");

    let (ra, rb) = tokio::join!(
        orch.process_and_record(&mut a, "from a"),
        orch.process_and_record(&mut b, "from b"),
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_eq!(a.turns()[0].input_text, "from a");
    assert_eq!(b.turns()[0].input_text, "from b");
    assert_eq!(inference.max_in_flight(), 2);
}

#[tokio::test]
async fn test_direct_transport_returns_audio_and_keeps_log() {
    let inference = FakeInference::replying(GREETING_REPLY);
    let synth = FakeSynthesizer::ok();
    let mut transport = DirectTransport::new(orchestrator(&inference, &synth));

    let audio = transport.deliver("Hello, how are you?").await.unwrap();
    assert_eq!(audio, audio_for(GREETING_REPLY));

    let err = transport.deliver("  ").await.unwrap_err();
    assert!(matches!(err, Error::EmptyInput));

    assert_eq!(transport.session().len(), 1);
    assert_eq!(inference.calls(), 1);
}

#[tokio::test]
async fn test_one_orchestrator_serves_many_transports() {
    let inference = FakeInference::replying("Oi!");
    let synth = FakeSynthesizer::ok();
    let orch: Arc<TurnOrchestrator> = orchestrator(&inference, &synth);

    let mut first = DirectTransport::new(orch.clone());
    let mut second = DirectTransport::new(orch);

    first.deliver("primeiro").await.unwrap();
    second.deliver("segundo").await.unwrap();
    second.deliver("terceiro").await.unwrap();

    assert_eq!(first.session().len(), 1);
    assert_eq!(second.session().len(), 2);
    assert_ne!(first.session().id(), second.session().id());
}
