//! End-to-end chat chain tests.
//!
//! Drives the orchestrator through complete chains and checks the
//! conversation, flags, and event ordering the presentation layer sees.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use query_chat::conversation::{Role, Turn};
use query_chat::error::Result;
use query_chat::gateway::{
    FailingDataGateway, MockDataGateway, MockModelGateway, ModelGateway,
};
use query_chat::orchestrator::{
    ConversationPhase, Orchestrator, SendOutcome, SessionEvent, SessionHandle,
    QUERY_ERROR_STATUS, QUERY_FAILURE_REPLY,
};
use query_chat::prompt::ANALYSIS_INSTRUCTION;
use query_chat::results::Row;
use query_chat::schema::SchemaDescriptor;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

/// A model gateway that blocks until released, to observe mid-chain state.
#[derive(Clone)]
struct GatedModelGateway {
    reply: String,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedModelGateway {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ModelGateway for GatedModelGateway {
    async fn complete(&self, _: &str, _: &[Turn], _: &str) -> Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

fn rows(value: serde_json::Value) -> Vec<Row> {
    serde_json::from_value(value).unwrap()
}

fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_user_turn_appended_before_model_resolves() {
    let gate = GatedModelGateway::new("Hello, how can I help?");
    let mut orchestrator = Orchestrator::new(
        Box::new(gate.clone()),
        Box::new(MockDataGateway::new()),
        SchemaDescriptor::default(),
    );
    let mut events = orchestrator.subscribe();

    let task = tokio::spawn(async move {
        let outcome = orchestrator.send_message("hello").await;
        (orchestrator, outcome)
    });

    gate.entered.notified().await;
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::TurnAppended(Turn::user("hello")),
            SessionEvent::PhaseChanged(ConversationPhase::AwaitingModelReply),
        ]
    );

    gate.release.notify_one();
    let (orchestrator, outcome) = task.await.unwrap();

    assert_eq!(outcome, SendOutcome::Replied);
    assert_eq!(orchestrator.session().conversation().len(), 3);
}

#[tokio::test]
async fn test_whitespace_input_issues_no_calls() {
    let model = MockModelGateway::new();
    let data = MockDataGateway::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(model.clone()),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );
    let mut events = orchestrator.subscribe();

    for input in ["", " ", "\n\t  "] {
        assert_eq!(orchestrator.send_message(input).await, SendOutcome::Ignored);
    }

    assert_eq!(orchestrator.session().conversation().len(), 1);
    assert_eq!(model.call_count(), 0);
    assert_eq!(data.call_count(), 0);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_single_column_query_sets_headers() {
    let model = MockModelGateway::new()
        .then_reply("SELECT applicant_first FROM applicant LIMIT 1")
        .then_reply("The applicant's first name is Maria.");
    let data = MockDataGateway::with_rows(rows(json!([{"applicant_first": "Maria"}])));
    let mut orchestrator = Orchestrator::new(
        Box::new(model),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );

    let outcome = orchestrator.send_message("Give me one first name").await;

    assert_eq!(outcome, SendOutcome::Answered { row_count: 1 });
    assert_eq!(
        orchestrator.session().results_table_headers(),
        &["applicant_first".to_string()]
    );
    assert!(orchestrator.session().results_visible());
    assert_eq!(
        data.calls()[0].sql,
        "SELECT applicant_first FROM applicant LIMIT 1"
    );
}

#[tokio::test]
async fn test_conversational_reply_appends_literal_text() {
    let model = MockModelGateway::new().then_reply("Hello, how can I help?");
    let data = MockDataGateway::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(model),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );

    let before = orchestrator.session().conversation().len();
    orchestrator.send_message("hi").await;

    let turns = orchestrator.session().conversation().turns();
    let assistant_turns: Vec<&Turn> = turns[before..]
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .collect();
    assert_eq!(assistant_turns, vec![&Turn::assistant("Hello, how can I help?")]);
    assert_eq!(data.call_count(), 0);
}

#[tokio::test]
async fn test_direct_sql_reply_executes_without_assistant_turn() {
    let model = MockModelGateway::new()
        .then_reply("SELECT id FROM country;")
        .then_reply("There are two countries.");
    let data = MockDataGateway::with_rows(rows(json!([{"id": 1}, {"id": 2}])));
    let mut orchestrator = Orchestrator::new(
        Box::new(model),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );
    let mut events = orchestrator.subscribe();

    orchestrator.send_message("list country ids").await;

    let calls = data.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].sql, "SELECT id FROM country;");
    assert!(calls[0].params.is_empty());

    let received = drain(&mut events);
    let results_at = received
        .iter()
        .position(|e| matches!(e, SessionEvent::ResultsReady(_)))
        .unwrap();
    let assistant_before_results = received[..results_at].iter().any(|e| {
        matches!(e, SessionEvent::TurnAppended(turn) if turn.role == Role::Assistant)
    });
    assert!(!assistant_before_results);
}

#[tokio::test]
async fn test_structured_json_reply_passes_params() {
    let model = MockModelGateway::new()
        .then_reply(r#"{"type":"query","query":"SELECT * FROM applicant WHERE applicantNumber = ?","params":[1001]}"#)
        .then_reply("Applicant 1001 is Maria Santos.");
    let data = MockDataGateway::with_sample_rows();
    let mut orchestrator = Orchestrator::new(
        Box::new(model),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );

    orchestrator.send_message("Who is applicant 1001?").await;

    let calls = data.calls();
    assert_eq!(calls[0].params, vec![json!(1001)]);
}

#[tokio::test]
async fn test_embedded_sql_reply_is_executed() {
    let model = MockModelGateway::new()
        .then_reply("Here you go:\nSELECT name FROM country;\nHope that helps!")
        .then_reply("Two countries.");
    let data = MockDataGateway::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(model),
        Box::new(data.clone()),
        SchemaDescriptor::default(),
    );

    orchestrator.send_message("country names").await;

    assert_eq!(data.calls()[0].sql, "SELECT name FROM country;");
}

#[tokio::test]
async fn test_data_failure_skips_explanation() {
    let model = MockModelGateway::new().then_reply("SELECT id FROM country;");
    let data = FailingDataGateway::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(model.clone()),
        Box::new(data),
        SchemaDescriptor::default(),
    );

    let before = orchestrator.session().conversation().len();
    let outcome = orchestrator.send_message("countries").await;

    assert_eq!(outcome, SendOutcome::QueryFailed);
    let session = orchestrator.session();
    assert_eq!(session.error(), Some(QUERY_ERROR_STATUS));
    assert!(session.results().is_none());
    assert_eq!(model.call_count(), 1);

    let assistant_turns: Vec<&Turn> = session.conversation().turns()[before..]
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .collect();
    assert_eq!(assistant_turns, vec![&Turn::assistant(QUERY_FAILURE_REPLY)]);
}

#[tokio::test]
async fn test_zero_rows_still_explained() {
    let model = MockModelGateway::new()
        .then_reply("SELECT applicant_first FROM applicant WHERE 1 = 0;")
        .then_reply("No applicants matched.");
    let data = MockDataGateway::new();
    let mut orchestrator = Orchestrator::new(
        Box::new(model.clone()),
        Box::new(data),
        SchemaDescriptor::default(),
    );

    let outcome = orchestrator.send_message("anyone named Zed?").await;

    assert_eq!(outcome, SendOutcome::Answered { row_count: 0 });
    assert!(orchestrator.session().results_table_headers().is_empty());
    assert!(orchestrator.session().results_visible());

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].last_message, ANALYSIS_INSTRUCTION);
    assert!(calls[1]
        .system_prompt
        .contains("QUERY RESULTS (JSON array of rows):\n[]"));
}

#[tokio::test]
async fn test_conversation_continues_after_failure() {
    let model = MockModelGateway::new()
        .then_fail("connection reset")
        .then_reply("Hello again!");
    let mut orchestrator = Orchestrator::new(
        Box::new(model.clone()),
        Box::new(MockDataGateway::new()),
        SchemaDescriptor::default(),
    );

    assert_eq!(orchestrator.send_message("hi").await, SendOutcome::ModelFailed);
    assert_eq!(orchestrator.send_message("hi?").await, SendOutcome::Replied);

    // The failed exchange stays in the history sent to the model.
    let calls = model.calls();
    assert_eq!(calls[1].history.len(), 2);
    assert_eq!(calls[1].history[0], Turn::user("hi"));
    assert_eq!(orchestrator.session().error(), None);
}

#[tokio::test]
async fn test_handle_rejects_message_while_busy() {
    let gate = GatedModelGateway::new("Hello!");
    let handle = SessionHandle::new(Orchestrator::new(
        Box::new(gate.clone()),
        Box::new(MockDataGateway::new()),
        SchemaDescriptor::default(),
    ));

    let background = handle.clone();
    let task = tokio::spawn(async move { background.send_message("first").await });

    gate.entered.notified().await;
    assert!(handle.is_busy());
    assert_eq!(handle.send_message("second").await, SendOutcome::Busy);

    gate.release.notify_one();
    assert_eq!(task.await.unwrap(), SendOutcome::Replied);
    assert!(!handle.is_busy());

    let snapshot = handle.snapshot().await;
    let contents: Vec<&str> = snapshot.turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents[1..], ["first", "Hello!"]);
}
