use alert_daemon::scheduler;
use alert_modem::at::ExecutorConfig;
use alert_modem::transport::{MemoryTransport, MemoryTransportHandle};
use alert_modem::{Modem, NotificationSink, NotifyError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(60);

/// Counts reports and takes `delay` to deliver each one.
#[derive(Default)]
struct CountingSink {
    reports: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl NotificationSink for CountingSink {
    async fn send(&self, _text: &str) -> Result<(), NotifyError> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        time::sleep(self.delay).await;
        Ok(())
    }
}

async fn healthy_modem(sink: Arc<CountingSink>) -> (Arc<Modem>, MemoryTransportHandle) {
    let (transport, module) = MemoryTransport::new();
    module.reply_to("AT", ["OK"]);
    module.reply_to("AT+CSQ", ["+CSQ: 24,99", "OK"]);
    module.reply_to("AT+CREG?", ["+CREG: 0,1", "OK"]);
    module.reply_to("AT+CPIN?", ["+CPIN: READY", "OK"]);
    module.reply_to("AT+COPS?", ["+COPS: 0,0,\"CHINA MOBILE\",7", "OK"]);
    module.reply_to("AT+CGSN", ["868371050123456", "OK"]);
    module.reply_to("ATH", ["OK"]);
    let modem = Modem::with_transport(transport, ExecutorConfig::default(), sink)
        .await
        .unwrap();

    (Arc::new(modem), module)
}

#[tokio::test(start_paused = true)]
async fn checks_run_once_per_interval() {
    let sink = Arc::new(CountingSink::default());
    let (modem, _module) = healthy_modem(sink.clone()).await;
    let cancel = CancellationToken::new();

    let handle = scheduler::spawn(modem, INTERVAL, cancel.clone());

    time::sleep(INTERVAL / 2).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 0);

    time::sleep(INTERVAL * 2).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn overlapping_check_is_skipped() {
    let sink = Arc::new(CountingSink {
        reports: AtomicUsize::new(0),
        delay: Duration::from_secs(90),
    });
    let (modem, _module) = healthy_modem(sink.clone()).await;
    let cancel = CancellationToken::new();

    let handle = scheduler::spawn(modem, INTERVAL, cancel.clone());

    // check at 60s is still delivering at 120s
    time::sleep(Duration::from_secs(170)).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 1);

    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn no_checks_while_a_call_is_watched() {
    let sink = Arc::new(CountingSink::default());
    let (modem, module) = healthy_modem(sink.clone()).await;
    module.reply_to("ATD10086;", ["OK"]);
    let session = modem.make_call_with_monitor("10086").await.unwrap();

    let cancel = CancellationToken::new();
    let handle = scheduler::spawn(modem.clone(), INTERVAL, cancel.clone());

    time::sleep(INTERVAL * 3).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 0);
    assert!(!module.written().iter().any(|c| c == "AT+CSQ"));

    modem.hangup_call().await.unwrap();
    session.cancel().await;
    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stops_on_cancel() {
    let sink = Arc::new(CountingSink::default());
    let (modem, _module) = healthy_modem(sink.clone()).await;
    let cancel = CancellationToken::new();

    let handle = scheduler::spawn(modem, INTERVAL, cancel.clone());
    cancel.cancel();
    handle.await.unwrap();

    time::sleep(INTERVAL * 2).await;
    assert_eq!(sink.reports.load(Ordering::SeqCst), 0);
}
