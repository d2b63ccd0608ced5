use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use survey_spec::{
    AnswerValue, FlowController, FlowError, FormEntries, MemorySink, SinkError, Stage,
    StaticSource, Submission, SubmissionSink, ValidationError,
};

const DOCUMENT: &str = include_str!("../tests/fixtures/survey.json");

fn docente_profile() -> FormEntries {
    FormEntries::new()
        .with("funcao", "Docente")
        .with("escolas_atuacao", "S1")
        .with("escolas_atuacao", "S2")
}

fn complete_responses() -> FormEntries {
    FormEntries::new()
        .with("formacao", "avaliacao")
        .with("planejamento", "Sim")
        .with("infraestrutura[S1]", "sim")
        .with("infraestrutura[S2]", "nao")
}

async fn boot<K: SubmissionSink>(sink: K) -> FlowController<K> {
    FlowController::boot(&StaticSource::new(DOCUMENT), sink)
        .await
        .expect("boot")
}

#[tokio::test]
async fn docente_flow_reaches_submitted_with_one_insert() {
    let flow = boot(MemorySink::new()).await;
    assert_eq!(flow.advance(&docente_profile()).expect("advance"), Stage::Questionnaire);

    let submission = flow.submit(&complete_responses()).await.expect("submit");
    assert_eq!(flow.stage(), Stage::Submitted);

    let records = flow.sink().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], submission);
    assert_eq!(
        serde_json::to_value(&records[0]).expect("json"),
        json!({
            "profile": { "funcao": "Docente", "escolas_atuacao": ["S1", "S2"] },
            "responses": {
                "formacao": ["avaliacao"],
                "planejamento": "Sim",
                "infraestrutura": { "S1": "sim", "S2": "nao" }
            }
        })
    );

    let controls = flow.render_current().expect("render");
    assert!(controls.iter().all(|control| control.disabled));
    assert!(matches!(
        flow.submit(&complete_responses()).await,
        Err(FlowError::InvalidTransition { stage: "submitted", .. })
    ));
    assert!(flow.back().is_err());
    assert_eq!(flow.sink().records().len(), 1);
}

#[tokio::test]
async fn missing_matrix_entity_blocks_submit_and_keeps_answers() {
    let flow = boot(MemorySink::new()).await;
    flow.advance(&docente_profile()).expect("advance");

    let partial = FormEntries::new()
        .with("formacao", "avaliacao")
        .with("planejamento", "Sim")
        .with("infraestrutura[S1]", "sim");
    let err = flow.submit(&partial).await.expect_err("blocked");
    assert!(matches!(
        &err,
        FlowError::Validation(ValidationError::MissingRequired(names)) if names == &["infraestrutura"]
    ));
    assert_eq!(err.status_message(), "Please answer: infraestrutura");
    assert_eq!(flow.stage(), Stage::Questionnaire);
    assert_eq!(
        flow.answers().responses["infraestrutura"],
        AnswerValue::by_entity([("S1", "sim")])
    );
    assert!(flow.sink().records().is_empty());
}

#[tokio::test]
async fn answer_to_question_that_became_inactive_is_not_submitted() {
    let flow = boot(MemorySink::new()).await;
    flow.advance(&docente_profile()).expect("advance");
    flow.back().expect("back");

    let coordinator = FormEntries::new()
        .with("funcao", "Coordenador")
        .with("escolas_atuacao", "S1");
    flow.advance(&coordinator).expect("advance again");

    let entries = FormEntries::new()
        .with("formacao", "inclusao")
        .with("planejamento", "Sim")
        .with("infraestrutura[S1]", "parcial")
        .with("infraestrutura[S2]", "sim");
    let submission = flow.submit(&entries).await.expect("submit");

    assert!(!submission.responses.contains_key("planejamento"));
    assert_eq!(
        submission.responses["infraestrutura"],
        AnswerValue::by_entity([("S1", "parcial")])
    );
}

#[derive(Default)]
struct FlakySink {
    fail_next: AtomicBool,
    calls: AtomicUsize,
    records: Mutex<Vec<Submission>>,
}

#[async_trait]
impl SubmissionSink for FlakySink {
    async fn insert(&self, record: &Submission) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Unavailable("connection reset".into()));
        }
        self.records.lock().expect("lock").push(record.clone());
        Ok(())
    }
}

#[tokio::test]
async fn sink_failure_keeps_questionnaire_stage_and_allows_retry() {
    let sink = FlakySink::default();
    sink.fail_next.store(true, Ordering::SeqCst);
    let flow = boot(sink).await;
    flow.advance(&docente_profile()).expect("advance");

    let err = flow.submit(&complete_responses()).await.expect_err("sink failure");
    assert!(matches!(err, FlowError::Submission(SinkError::Unavailable(_))));
    assert!(err.is_recoverable());
    assert_eq!(flow.stage(), Stage::Questionnaire);
    assert!(!flow.is_busy());
    assert_eq!(flow.answers().responses.len(), 3);

    flow.submit(&complete_responses()).await.expect("retry");
    assert_eq!(flow.stage(), Stage::Submitted);
    assert_eq!(flow.sink().calls.load(Ordering::SeqCst), 2);
    assert_eq!(flow.sink().records.lock().expect("lock").len(), 1);
}

#[derive(Default)]
struct GatedSink {
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl SubmissionSink for GatedSink {
    async fn insert(&self, _record: &Submission) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn second_submit_while_pending_is_rejected() {
    let flow = boot(GatedSink::default()).await;
    flow.advance(&docente_profile()).expect("advance");
    let entries = complete_responses();

    let first = flow.submit(&entries);
    let second = async {
        tokio::task::yield_now().await;
        assert!(flow.is_busy());
        let result = flow.submit(&entries).await;
        flow.sink().gate.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert!(matches!(second, Err(FlowError::SubmissionInFlight)));
    assert_eq!(flow.sink().calls.load(Ordering::SeqCst), 1);
    assert_eq!(flow.stage(), Stage::Submitted);
}

#[tokio::test]
async fn restart_discards_answers() {
    let flow = boot(MemorySink::new()).await;
    flow.advance(&docente_profile()).expect("advance");
    flow.restart().expect("restart");
    assert_eq!(flow.stage(), Stage::Profile);
    assert!(flow.answers().profile.is_empty());
}
