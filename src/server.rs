use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::app::InsightApp;
use crate::error::Result;
use crate::message::Message;
use crate::platform::Platform;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub status: String,
    pub answer: String,
    pub history: Vec<Message>,
}

/// JSON transport for the UI collaborator. Not a UI; the transcript shape
/// round-trips unchanged through `history`.
pub struct AgentServer<P: Platform> {
    app: Arc<InsightApp<P>>,
}

impl<P: Platform + 'static> AgentServer<P> {
    pub fn new(app: InsightApp<P>) -> Self {
        Self { app: Arc::new(app) }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .route("/ask", post(Self::ask))
            .with_state(self.app)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let app = self.router();
        axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
        Ok(())
    }

    async fn health() -> impl IntoResponse {
        "ok"
    }

    async fn ask(
        State(app): State<Arc<InsightApp<P>>>,
        Json(payload): Json<AskRequest>,
    ) -> impl IntoResponse {
        match app.answer(&payload.question, payload.history.clone()).await {
            Some(answer) => Json(AskResponse {
                status: answer.status,
                answer: answer.text,
                history: answer.history,
            }),
            // Empty question: no state change, the history echoes back.
            None => Json(AskResponse {
                status: String::new(),
                answer: String::new(),
                history: payload.history,
            }),
        }
    }
}
