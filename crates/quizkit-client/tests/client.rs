use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quizkit_client::{ClientConfig, QuizContext};
use quizkit_core::mock::MemoryStore;
use quizkit_core::model::{AnswerMode, AnswerRequest};
use quizkit_core::token;
use quizkit_core::traits::SilentNotifier;

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "message": "success",
        "data": data,
        "timestamp": 0
    }))
}

fn context(server: &MockServer) -> QuizContext {
    let config = ClientConfig {
        base_url: format!("{}/api", server.uri()),
        retry_delay_ms: 1,
        report_errors: false,
        ..ClientConfig::default()
    };
    QuizContext::new(config, Arc::new(MemoryStore::default()), Arc::new(SilentNotifier)).unwrap()
}

fn questions() -> serde_json::Value {
    json!([
        {"id": 1, "type": "single", "content": "1+1?", "options": ["1", "2"]},
        {"id": 2, "type": "judge", "content": "Rust has a GC", "options": []}
    ])
}

#[tokio::test]
async fn bank_questions_are_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/questions/bank/5"))
        .respond_with(ok(questions()))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    let first = ctx.client().questions_by_bank(5).await.unwrap();
    let second = ctx.client().questions_by_bank(5).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn submitting_an_answer_invalidates_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/answers/stats"))
        .respond_with(ok(json!({"totalAnswers": 3, "correctAnswers": 2, "accuracy": 66.7})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/answers"))
        .and(body_json(json!({"questionId": 1, "userAnswer": "2"})))
        .respond_with(ok(json!({"questionId": 1, "userAnswer": "2", "isCorrect": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    let client = ctx.client();
    client.answer_stats().await.unwrap();
    client.answer_stats().await.unwrap();

    let result = client.submit_answer(&AnswerRequest::new(1, "2")).await.unwrap();
    assert!(result.is_correct);
    let stats = client.answer_stats().await.unwrap();
    assert_eq!(stats.total_answers, 3);
}

#[tokio::test]
async fn login_stores_credentials_for_later_calls() {
    let server = MockServer::start().await;
    let token = token::unsigned_token(chrono::Utc::now().timestamp() + 86_400);
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ok(json!({
            "token": token,
            "user": {"id": 1, "username": "alice", "role": "admin"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ok(json!({"id": 1, "username": "alice"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;

    let ctx = context(&server);
    let user = ctx.client().login("alice", "secret", true).await.unwrap();
    assert!(user.is_admin());
    assert_eq!(ctx.credentials().token().as_deref(), Some(token.as_str()));
    assert!(ctx.credentials().remaining_secs() > 86_000);

    ctx.client().profile().await.unwrap();

    ctx.client().logout().await.unwrap();
    assert!(ctx.credentials().token().is_none());
    assert!(ctx.credentials().user().is_none());
}

#[tokio::test]
async fn mark_mastered_uses_put() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/wrong-questions/7/mastered"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/wrong-questions/7/unmastered"))
        .respond_with(ok(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    ctx.client().mark_mastered(7, true).await.unwrap();
    ctx.client().mark_mastered(7, false).await.unwrap();
}

#[tokio::test]
async fn exam_session_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/questions/bank/5"))
        .respond_with(ok(questions()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/answers/batch"))
        .respond_with(ok(json!([
            {"questionId": 1, "userAnswer": "2", "isCorrect": 1, "correctAnswer": "2"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server);
    let engine = ctx.engine();
    engine.start(5, AnswerMode::Exam).unwrap();
    assert_eq!(engine.load_bank().await.unwrap(), 2);

    engine.stage_answer(1, "2").unwrap();
    engine.stage_answer(2, "false").unwrap();
    let outcome = engine.submit_staged().await.unwrap();
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.correct_count, 1);
    assert_eq!(outcome.unconfirmed, vec![2]);

    let requests = server.received_requests().await.unwrap();
    let batch: serde_json::Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    assert_eq!(batch.as_array().unwrap().len(), 2);
    assert_eq!(batch[0]["questionIndex"], 0);

    let summary = engine.finalize().unwrap();
    assert_eq!(summary.correct_count, 1);
    assert_eq!(summary.answers.len(), 1);
}
