//! Terminal side of the correction channel.
//!
//! Requests arrive one at a time from the coordinator. Each one pauses the
//! progress bar, asks on the terminal until the input validates, and sends
//! back exactly one response.

use std::sync::Arc;

use console::{style, Term};
use indicatif::ProgressBar;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::services::{CorrectionInbox, CorrectionRequest, CorrectionResponse};

/// Serve correction requests on the terminal until the coordinator hangs up.
pub fn spawn_terminal_prompt(
    mut inbox: CorrectionInbox,
    progress: Arc<Mutex<Option<ProgressBar>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(pending) = inbox.recv().await {
            let bar = progress.lock().await.clone();
            let request = pending.request().clone();

            let answer = tokio::task::spawn_blocking(move || match bar {
                Some(bar) => bar.suspend(|| ask(&Term::stderr(), &request)),
                None => ask(&Term::stderr(), &request),
            })
            .await;

            match answer {
                Ok(response) => pending.respond(response),
                // Dropping the request makes the coordinator stop
                Err(e) => tracing::error!("Correction prompt failed: {}", e),
            }
        }
    })
}

/// Ask until the answer validates. A closed terminal stops the run.
fn ask(term: &Term, request: &CorrectionRequest) -> CorrectionResponse {
    let _ = term.write_line("");
    let _ = term.write_line(&format!(
        "{} Could not determine the page number of {}",
        style("?").yellow().bold(),
        style(&request.filename).bold()
    ));
    if let Some(ref reason) = request.reason {
        let _ = term.write_line(&format!("  {} {}", style("reason:").dim(), reason));
    }
    let _ = term.write_line(&format!(
        "  Last confirmed page: {}. Enter 0-{} (0 = opening term, {} = closing term),",
        request.last_confirmed,
        request.max_choice(),
        request.max_choice()
    ));
    let _ = term.write_line(&format!(
        "  Enter to accept {}, 'e' to save as error, 's' to stop.",
        request.suggested()
    ));

    loop {
        let _ = term.write_str(&format!("{} ", style(">").cyan()));
        let line = match term.read_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Cannot read correction input: {}", e);
                return request.stop();
            }
        };

        match parse_answer(request, &line) {
            Ok(response) => return response,
            Err(message) => {
                let _ = term.write_line(&format!("  {} {}", style("✗").red(), message));
            }
        }
    }
}

/// Map one line of input to a response.
fn parse_answer(request: &CorrectionRequest, line: &str) -> Result<CorrectionResponse, String> {
    match line.trim().to_lowercase().as_str() {
        "" => Ok(request.skip()),
        "e" | "error" | "erro" => Ok(request.leave_unresolved()),
        "s" | "stop" | "q" | "quit" => Ok(request.stop()),
        _ => request.confirm_input(line).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CorrectionAction;

    #[test]
    fn test_parse_answer() {
        let request = CorrectionRequest::new("IMG_0004.jpg", 3, 300);

        assert_eq!(
            parse_answer(&request, "").unwrap().action(),
            CorrectionAction::Skip(4)
        );
        assert_eq!(
            parse_answer(&request, " 12 ").unwrap().action(),
            CorrectionAction::Confirm(12)
        );
        assert_eq!(
            parse_answer(&request, "E").unwrap().action(),
            CorrectionAction::LeaveUnresolved
        );
        assert_eq!(
            parse_answer(&request, "stop").unwrap().action(),
            CorrectionAction::Stop
        );
        assert!(parse_answer(&request, "302").is_err());
        assert!(parse_answer(&request, "twelve").is_err());
    }
}
