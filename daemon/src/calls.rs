//! Alert call plans: announce, then ring each number in turn.

use alert_modem::status::TIMESTAMP_FORMAT;
use alert_modem::{CallStatus, Modem, NotificationSink};
use chrono::Local;
use derive_more::Display;
use serde::Serialize;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub name: String,
    pub numbers: Vec<String>,
    /// How long each call rings before it is hung up.
    pub duration: Duration,
}

#[derive(Display, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CallResult {
    /// The call ran its course; `status` is how it ended.
    #[display("completed ({status})")]
    Completed { status: CallStatus },
    #[display("dial failed: {reason}")]
    DialFailed { reason: String },
    #[display("dialed but hangup failed: {reason}")]
    HangupFailed { reason: String },
}

#[derive(Display, Debug, Clone, PartialEq, Eq, Serialize)]
#[display("{number}: {result}")]
pub struct CallOutcome {
    pub number: String,
    #[serde(flatten)]
    pub result: CallResult,
}

pub fn announcement(plan: &CallPlan) -> String {
    format!(
        "Alert calls for {}\n\
         Numbers: {}\n\
         Time: {}\n\
         Calls about to start",
        plan.name,
        plan.numbers.join(", "),
        Local::now().format(TIMESTAMP_FORMAT),
    )
}

/// Runs `plan`, one number after another. Failures are recorded per number
/// and never stop the remaining calls.
pub async fn place_calls(
    modem: &Modem,
    sink: &dyn NotificationSink,
    plan: &CallPlan,
) -> Vec<CallOutcome> {
    if let Err(e) = sink.send(&announcement(plan)).await {
        error!("failed to send call announcement: {e}");
    }

    let mut outcomes = Vec::with_capacity(plan.numbers.len());
    for number in &plan.numbers {
        let outcome = call_one(modem, number, plan.duration).await;
        info!(%outcome, "call finished");
        outcomes.push(outcome);
    }

    outcomes
}

async fn call_one(modem: &Modem, number: &str, duration: Duration) -> CallOutcome {
    let outcome = |result| CallOutcome {
        number: number.to_owned(),
        result,
    };

    let mut session = match modem.make_call_with_monitor(number).await {
        Ok(session) => session,
        Err(e) => {
            error!(number, "failed to dial: {e}");
            return outcome(CallResult::DialFailed {
                reason: e.to_string(),
            });
        }
    };

    let mut ended = None;
    let deadline = time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            status = session.next_status() => match status {
                Some(status) if status.ends_call() => {
                    ended = Some(status);
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    // The module may already have dropped the call, ATH is harmless then.
    let hangup = modem.hangup_call().await;
    session.cancel().await;

    match hangup {
        Ok(()) => outcome(CallResult::Completed {
            status: ended.unwrap_or(CallStatus::Hangup),
        }),
        Err(e) => {
            warn!(number, "failed to hang up: {e}");
            outcome(CallResult::HangupFailed {
                reason: e.to_string(),
            })
        }
    }
}
