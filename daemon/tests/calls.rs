use alert_daemon::calls::{CallOutcome, CallPlan, CallResult, place_calls};
use alert_modem::at::ExecutorConfig;
use alert_modem::transport::{MemoryTransport, MemoryTransportHandle};
use alert_modem::{CallStatus, LogSink, Modem, NotificationSink, NotifyError};
use async_trait::async_trait;
use mockall::{mock, predicate::function};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

mock! {
    pub Sink {}
    #[async_trait]
    impl NotificationSink for Sink {
        async fn send(&self, text: &str) -> Result<(), NotifyError>;
    }
}

async fn driver(sink: impl NotificationSink) -> (Arc<Modem>, MemoryTransportHandle) {
    let (transport, module) = MemoryTransport::new();
    module.reply_to("AT", ["OK"]);
    module.reply_to("ATH", ["OK"]);
    let modem = Modem::with_transport(transport, ExecutorConfig::default(), Arc::new(sink))
        .await
        .unwrap();

    (Arc::new(modem), module)
}

fn plan(numbers: &[&str], duration: Duration) -> CallPlan {
    CallPlan {
        name: "disk full on db-1".into(),
        numbers: numbers.iter().map(|n| n.to_string()).collect(),
        duration,
    }
}

async fn wait_for_write(module: &MemoryTransportHandle, command: &str) {
    while !module.written().iter().any(|c| c == command) {
        time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn announces_then_calls_every_number() {
    let mut sink = MockSink::new();
    sink.expect_send()
        .once()
        .with(function(|text: &str| {
            text.contains("disk full on db-1")
                && text.contains("Numbers: 10086, 10010")
                && text.contains("Calls about to start")
        }))
        .returning(|_| Ok(()));
    let (modem, module) = driver(LogSink).await;
    module.reply_to("ATD10086;", ["OK"]);
    module.reply_to("ATD10010;", ["ERROR"]);

    let calls = {
        let modem = modem.clone();
        tokio::spawn(async move {
            let plan = plan(&["10086", "10010"], Duration::from_secs(30));
            place_calls(&modem, &sink, &plan).await
        })
    };
    wait_for_write(&module, "ATD10086;").await;
    module.push_line("BUSY");

    let outcomes = calls.await.unwrap();

    assert_eq!(
        outcomes,
        vec![
            CallOutcome {
                number: "10086".into(),
                result: CallResult::Completed {
                    status: CallStatus::Busy
                },
            },
            CallOutcome {
                number: "10010".into(),
                result: CallResult::DialFailed {
                    reason: r#"module rejected dial, response: "ERROR\n""#.into()
                },
            },
        ]
    );
    assert!(!modem.call_active());
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_is_hung_up_after_duration() {
    let (modem, module) = driver(LogSink).await;
    module.reply_to("ATD13800138000;", ["OK"]);

    let started = Instant::now();
    let outcomes = place_calls(
        &modem,
        &LogSink,
        &plan(&["138 0013 8000"], Duration::from_secs(30)),
    )
    .await;

    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(
        outcomes[0].result,
        CallResult::Completed {
            status: CallStatus::Hangup
        }
    );
    assert_eq!(
        module.written(),
        ["AT", "ATD13800138000;", "ATH"].map(String::from)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_hangup_is_recorded() {
    let (modem, module) = driver(LogSink).await;
    module.reply_to("ATD10086;", ["OK"]);
    module.reply_to("ATH", ["ERROR"]);

    let outcomes =
        place_calls(&modem, &LogSink, &plan(&["10086"], Duration::from_secs(5))).await;

    assert!(matches!(
        outcomes[0].result,
        CallResult::HangupFailed { .. }
    ));
    assert_eq!(outcomes[0].to_string().split(':').next(), Some("10086"));
}

#[tokio::test(start_paused = true)]
async fn announcement_failure_does_not_stop_calls() {
    let mut sink = MockSink::new();
    sink.expect_send()
        .once()
        .returning(|_| Err(NotifyError::Request("timed out".into())));
    let (modem, module) = driver(LogSink).await;
    module.reply_to("ATD10086;", ["OK"]);

    let outcomes =
        place_calls(&modem, &sink, &plan(&["10086"], Duration::from_secs(5))).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].result, CallResult::Completed { .. }));
}
