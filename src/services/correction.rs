//! Manual correction protocol.
//!
//! When a page cannot be numbered the coordinator asks a human. The request
//! blocks sequential consumption (OCR workers keep running) until exactly one
//! answer comes back. Answers can only be built through the validating
//! constructors on `CorrectionRequest`, so the coordinator never sees an
//! out-of-range number.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Everything the boundary needs to ask about one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionRequest {
    pub filename: String,
    pub last_confirmed: u32,
    pub max_pages: u32,
    /// Worker failure that caused the escalation, if any.
    pub reason: Option<String>,
}

/// Rejected human input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrectionInputError {
    #[error("'{0}' is not a page number")]
    NotANumber(String),

    #[error("page {number} is out of range (0-{max})")]
    OutOfRange { number: u32, max: u32 },
}

/// What the human decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionAction {
    /// Use this page number and remember it for the file.
    Confirm(u32),
    /// Accept the suggested number (last confirmed + 1).
    Skip(u32),
    /// Save the page under an error name.
    LeaveUnresolved,
    /// Cancel the whole run.
    Stop,
}

/// A validated answer to a `CorrectionRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionResponse {
    action: CorrectionAction,
}

impl CorrectionResponse {
    pub fn action(&self) -> CorrectionAction {
        self.action
    }
}

impl CorrectionRequest {
    pub fn new(filename: impl Into<String>, last_confirmed: u32, max_pages: u32) -> Self {
        Self {
            filename: filename.into(),
            last_confirmed,
            max_pages,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Number offered by default: the page after the last confirmed one.
    pub fn suggested(&self) -> u32 {
        self.last_confirmed + 1
    }

    /// Highest number a human may enter (the closing term).
    pub fn max_choice(&self) -> u32 {
        self.max_pages + 1
    }

    /// Confirm a page number in `0..=max_pages + 1`.
    pub fn confirm(&self, number: u32) -> Result<CorrectionResponse, CorrectionInputError> {
        if number > self.max_choice() {
            return Err(CorrectionInputError::OutOfRange {
                number,
                max: self.max_choice(),
            });
        }
        Ok(CorrectionResponse {
            action: CorrectionAction::Confirm(number),
        })
    }

    /// Parse and confirm typed input.
    pub fn confirm_input(&self, input: &str) -> Result<CorrectionResponse, CorrectionInputError> {
        let trimmed = input.trim();
        let number = trimmed
            .parse::<u32>()
            .map_err(|_| CorrectionInputError::NotANumber(trimmed.to_string()))?;
        self.confirm(number)
    }

    pub fn skip(&self) -> CorrectionResponse {
        CorrectionResponse {
            action: CorrectionAction::Skip(self.suggested()),
        }
    }

    pub fn leave_unresolved(&self) -> CorrectionResponse {
        CorrectionResponse {
            action: CorrectionAction::LeaveUnresolved,
        }
    }

    pub fn stop(&self) -> CorrectionResponse {
        CorrectionResponse {
            action: CorrectionAction::Stop,
        }
    }
}

/// Synchronous request/response channel to whoever resolves pages.
#[async_trait]
pub trait CorrectionGateway: Send + Sync {
    /// Ask for a decision. Returns only once an answer exists.
    async fn request(&self, request: CorrectionRequest) -> CorrectionResponse;
}

/// Answers every request without asking anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedPolicy {
    /// Save unresolved pages under `ERRO_OCR_` names.
    SaveAsError,
    /// Cancel the run at the first unresolved page.
    Stop,
}

#[async_trait]
impl CorrectionGateway for FixedPolicy {
    async fn request(&self, request: CorrectionRequest) -> CorrectionResponse {
        match self {
            Self::SaveAsError => request.leave_unresolved(),
            Self::Stop => request.stop(),
        }
    }
}

/// A request waiting at the boundary for its single reply.
#[derive(Debug)]
pub struct PendingCorrection {
    request: CorrectionRequest,
    reply: oneshot::Sender<CorrectionResponse>,
}

impl PendingCorrection {
    pub fn request(&self) -> &CorrectionRequest {
        &self.request
    }

    /// Send the answer back to the coordinator.
    pub fn respond(self, response: CorrectionResponse) {
        if self.reply.send(response).is_err() {
            tracing::debug!(
                "Correction for {} answered after the run ended",
                self.request.filename
            );
        }
    }
}

/// Coordinator side of the correction channel.
pub struct CorrectionClient {
    tx: mpsc::Sender<PendingCorrection>,
    outstanding: Mutex<()>,
}

/// Boundary side of the correction channel.
pub struct CorrectionInbox {
    rx: mpsc::Receiver<PendingCorrection>,
}

impl CorrectionInbox {
    /// Wait for the next request. `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<PendingCorrection> {
        self.rx.recv().await
    }
}

/// Create a rendezvous channel between coordinator and boundary.
pub fn correction_channel() -> (CorrectionClient, CorrectionInbox) {
    let (tx, rx) = mpsc::channel(1);
    (
        CorrectionClient {
            tx,
            outstanding: Mutex::new(()),
        },
        CorrectionInbox { rx },
    )
}

#[async_trait]
impl CorrectionGateway for CorrectionClient {
    async fn request(&self, request: CorrectionRequest) -> CorrectionResponse {
        // Serializes callers: at most one request is ever in flight
        let _guard = self.outstanding.lock().await;

        let (reply, answer) = oneshot::channel();
        let fallback = request.stop();
        let filename = request.filename.clone();

        if self
            .tx
            .send(PendingCorrection { request, reply })
            .await
            .is_err()
        {
            tracing::warn!(
                "Correction boundary closed before {} could be asked; stopping",
                filename
            );
            return fallback;
        }

        match answer.await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(
                    "Correction request for {} was dropped without an answer; stopping",
                    filename
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_validates_range() {
        let request = CorrectionRequest::new("a.jpg", 4, 300);
        assert_eq!(
            request.confirm(0).unwrap().action(),
            CorrectionAction::Confirm(0)
        );
        assert_eq!(
            request.confirm(301).unwrap().action(),
            CorrectionAction::Confirm(301)
        );
        assert_eq!(
            request.confirm(302).unwrap_err(),
            CorrectionInputError::OutOfRange {
                number: 302,
                max: 301
            }
        );
    }

    #[test]
    fn test_confirm_input_parses() {
        let request = CorrectionRequest::new("a.jpg", 4, 300);
        assert_eq!(
            request.confirm_input(" 17\n").unwrap().action(),
            CorrectionAction::Confirm(17)
        );
        assert!(matches!(
            request.confirm_input("seventeen"),
            Err(CorrectionInputError::NotANumber(_))
        ));
        assert!(matches!(
            request.confirm_input("-3"),
            Err(CorrectionInputError::NotANumber(_))
        ));
    }

    #[test]
    fn test_skip_uses_suggestion() {
        let request = CorrectionRequest::new("a.jpg", 4, 300);
        assert_eq!(request.skip().action(), CorrectionAction::Skip(5));
        assert_eq!(
            request.leave_unresolved().action(),
            CorrectionAction::LeaveUnresolved
        );
    }

    #[tokio::test]
    async fn test_fixed_policies() {
        let request = CorrectionRequest::new("a.jpg", 0, 10);
        assert_eq!(
            FixedPolicy::SaveAsError.request(request.clone()).await.action(),
            CorrectionAction::LeaveUnresolved
        );
        assert_eq!(
            FixedPolicy::Stop.request(request).await.action(),
            CorrectionAction::Stop
        );
    }

    #[tokio::test]
    async fn test_channel_round_trip() {
        let (client, mut inbox) = correction_channel();

        let boundary = tokio::spawn(async move {
            let pending = inbox.recv().await.unwrap();
            assert_eq!(pending.request().filename, "x.jpg");
            let answer = pending.request().confirm(9).unwrap();
            pending.respond(answer);
        });

        let response = client
            .request(CorrectionRequest::new("x.jpg", 8, 300))
            .await;
        assert_eq!(response.action(), CorrectionAction::Confirm(9));
        boundary.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_request_stops() {
        let (client, mut inbox) = correction_channel();
        tokio::spawn(async move {
            // Receive and drop without answering
            let _ = inbox.recv().await;
        });

        let response = client.request(CorrectionRequest::new("x.jpg", 0, 10)).await;
        assert_eq!(response.action(), CorrectionAction::Stop);
    }

    #[tokio::test]
    async fn test_closed_boundary_stops() {
        let (client, inbox) = correction_channel();
        drop(inbox);
        let response = client.request(CorrectionRequest::new("x.jpg", 0, 10)).await;
        assert_eq!(response.action(), CorrectionAction::Stop);
    }
}
