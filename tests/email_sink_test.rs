//! Tests for composing and sending log emails

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tideway_email_sink::{
    BatchTextFormatter, EmailMessage, EmailSink, EmailSinkError, EmailSinkOptions, EmailTransport,
    InMemoryTransport, Level, LogEvent, MessageTemplateFormatter, Result, TextFormatter,
    address::split_addresses,
};

fn options() -> EmailSinkOptions {
    EmailSinkOptions::new("from@localhost.local", "to@localhost.local", "localhost")
        .subject_template("[{Level}] {Message}{NewLine}{Exception}")
        .body_template("[{Level}] {Message}")
}

/// Transport that fails every send and counts the attempts
#[derive(Clone, Default)]
struct FailingTransport {
    attempts: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl EmailTransport for FailingTransport {
    async fn send(&self, _message: &EmailMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EmailSinkError::transport("connection refused"))
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Renders the batch as an HTML table, one row per event
struct HtmlTableFormatter;

impl TextFormatter for HtmlTableFormatter {
    fn format(&self, event: &LogEvent, output: &mut String) -> Result<()> {
        output.push_str("<tr>");
        for c in event.message.chars() {
            match c {
                '<' => output.push_str("&lt;"),
                '>' => output.push_str("&gt;"),
                '&' => output.push_str("&amp;"),
                _ => output.push(c),
            }
        }
        output.push_str("</tr>");
        Ok(())
    }
}

impl BatchTextFormatter for HtmlTableFormatter {
    fn format_batch(&self, events: &[LogEvent], output: &mut String) -> Result<()> {
        output.push_str("<table>");
        for event in events {
            self.format(event, output)?;
        }
        output.push_str("</table>");
        Ok(())
    }
}

struct BrokenFormatter;

impl TextFormatter for BrokenFormatter {
    fn format(&self, _event: &LogEvent, _output: &mut String) -> Result<()> {
        Err(anyhow::anyhow!("template exploded").into())
    }
}

#[tokio::test]
async fn test_two_events_make_one_email() {
    let transport = InMemoryTransport::new();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    sink.emit_batch(&[
        LogEvent::new(Level::Information, "A"),
        LogEvent::new(Level::Error, "B"),
    ])
    .await
    .unwrap();

    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body(), "[Information] A\n[Error] B\n");
    assert_eq!(sent[0].subject(), "[Error] B");
    assert_eq!(sent[0].from(), "from@localhost.local");
    assert_eq!(sent[0].to(), ["to@localhost.local"]);
}

#[tokio::test]
async fn test_each_batch_sends_exactly_once() {
    let transport = InMemoryTransport::new();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    for n in 1..=3 {
        let batch: Vec<LogEvent> = (0..n).map(|i| LogEvent::new(Level::Warning, format!("event {}", i))).collect();
        sink.emit_batch(&batch).await.unwrap();
    }
    sink.emit_batch(&[]).await.unwrap();

    assert_eq!(transport.sent_count().await, 3);
}

#[tokio::test]
async fn test_subject_follows_most_severe_event() {
    let transport = InMemoryTransport::new();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    sink.emit_batch(&[
        LogEvent::new(Level::Error, "disk full"),
        LogEvent::new(Level::Information, "retrying"),
        LogEvent::new(Level::Warning, "slow write"),
    ])
    .await
    .unwrap();
    sink.emit_batch(&[
        LogEvent::new(Level::Information, "retrying"),
        LogEvent::new(Level::Warning, "slow write"),
        LogEvent::new(Level::Error, "disk full"),
    ])
    .await
    .unwrap();

    let subjects: Vec<String> = transport.sent().await.iter().map(|m| m.subject().to_string()).collect();
    assert_eq!(subjects, ["[Error] disk full", "[Error] disk full"]);
}

#[tokio::test]
async fn test_subject_never_contains_line_breaks() {
    let transport = InMemoryTransport::new();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    sink.emit_batch(&[LogEvent::new(Level::Fatal, "A multiline\nMessage").with_exception("stack trace")])
        .await
        .unwrap();

    let sent = transport.sent().await;
    assert_eq!(sent[0].subject(), "[Fatal] A multiline");
    assert!(!sent[0].subject().contains(['\r', '\n']));
}

#[tokio::test]
async fn test_default_subject() {
    let transport = InMemoryTransport::new();
    let options = EmailSinkOptions::new("from@test.com", "to@test.com", "localhost");
    let sink = EmailSink::new(options, transport.clone()).unwrap();

    sink.emit_batch(&[LogEvent::new(Level::Error, "boom")]).await.unwrap();

    let sent = transport.sent().await;
    assert_eq!(sent[0].subject(), "Log Messages");
    assert!(sent[0].body().contains("[Error] boom\n"));
}

#[tokio::test]
async fn test_batch_formatter_wraps_whole_batch() {
    let transport = InMemoryTransport::new();
    let options = options().batch_body_formatter(HtmlTableFormatter).html(true);
    let sink = EmailSink::new(options, transport.clone()).unwrap();

    sink.emit_batch(&[
        LogEvent::new(Level::Information, "Information"),
        LogEvent::new(Level::Warning, "Warning"),
        LogEvent::new(Level::Error, "<Error>"),
    ])
    .await
    .unwrap();

    let sent = transport.sent().await;
    assert_eq!(
        sent[0].body(),
        "<table><tr>Information</tr><tr>Warning</tr><tr>&lt;Error&gt;</tr></table>"
    );
    assert!(sent[0].is_body_html());
}

#[tokio::test]
async fn test_per_event_custom_formatter() {
    let transport = InMemoryTransport::new();
    let options = options().body_formatter(MessageTemplateFormatter::new("{Level:u3} {Message} {host}"));
    let sink = EmailSink::new(options, transport.clone()).unwrap();

    sink.emit_batch(&[LogEvent::new(Level::Warning, "slow").with_property("host", "db-1")])
        .await
        .unwrap();

    assert_eq!(transport.sent().await[0].body(), "WRN slow db-1\n");
}

#[tokio::test]
async fn test_formatter_failure_aborts_send() {
    let transport = InMemoryTransport::new();
    let sink = EmailSink::new(options().body_formatter(BrokenFormatter), transport.clone()).unwrap();

    let err = sink.emit_batch(&[LogEvent::new(Level::Error, "x")]).await.unwrap_err();

    assert!(err.to_string().contains("template exploded"));
    assert_eq!(transport.sent_count().await, 0);
}

#[tokio::test]
async fn test_transport_failure_is_returned() {
    let transport = FailingTransport::default();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    let err = sink.emit_batch(&[LogEvent::new(Level::Error, "x")]).await.unwrap_err();

    assert!(matches!(err, EmailSinkError::Transport(_)));
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispose_without_batches_releases_once() {
    let transport = FailingTransport::default();
    let sink = EmailSink::new(options(), transport.clone()).unwrap();

    sink.dispose().await.unwrap();

    assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(transport.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_recipient_list_parsing() {
    assert_eq!(
        split_addresses("to@a, Name <to@b>; to@c"),
        vec!["to@a", "to@b", "to@c"]
    );

    let options = EmailSinkOptions::new("from@test.com", " ops@test.com ;; dba@test.com, ", "localhost");
    assert_eq!(options.to, vec!["ops@test.com", "dba@test.com"]);
}

#[test]
fn test_construction_requires_sender_and_recipient() {
    let no_from = EmailSinkOptions::new("", "to@test.com", "localhost");
    let err = EmailSink::new(no_from, InMemoryTransport::new()).unwrap_err();
    assert!(err.to_string().contains("'from' is required"));

    let no_to = EmailSinkOptions::new("from@test.com", "", "localhost");
    let err = EmailSink::new(no_to, InMemoryTransport::new()).unwrap_err();
    assert!(err.to_string().contains("'to' is required"));
}

#[cfg(feature = "smtp")]
#[test]
fn test_smtp_sink_requires_host() {
    let options = EmailSinkOptions::new("from@test.com", "to@test.com", "");
    assert!(EmailSink::smtp(options).unwrap_err().is_invalid_argument());
}
