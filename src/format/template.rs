//! Message-template formatter
//!
//! Templates mix literal text with `{Name}` or `{Name:format}` tokens:
//!
//! | Token          | Renders                                                  |
//! |----------------|----------------------------------------------------------|
//! | `{Timestamp}`  | event time; format uses `yyyy MM dd HH mm ss fff zzz`    |
//! | `{Level}`      | level name; `:u3` / `:w3` give `ERR` / `err`             |
//! | `{Message}`    | rendered message                                         |
//! | `{NewLine}`    | a line feed                                              |
//! | `{Exception}`  | exception text and a line feed, or nothing               |
//! | `{Properties}` | all properties as `key=value` pairs                      |
//! | `{Other}`      | the property named `Other`, verbatim if absent           |
//!
//! `{{` and `}}` produce literal braces. A token that never closes is kept
//! as literal text.

use super::TextFormatter;
use crate::error::Result;
use crate::event::LogEvent;
use std::fmt::Write;

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %:z";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Timestamp(String),
    Level(Option<String>),
    Message,
    NewLine,
    Exception,
    Properties,
    Property { name: String, raw: String },
}

/// Formatter driven by a message template such as `"[{Level}] {Message}"`
#[derive(Debug, Clone)]
pub struct MessageTemplateFormatter {
    template: String,
    tokens: Vec<Token>,
}

impl MessageTemplateFormatter {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let tokens = parse(&template);
        Self { template, tokens }
    }

    /// The template text this formatter was built from
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl TextFormatter for MessageTemplateFormatter {
    fn format(&self, event: &LogEvent, output: &mut String) -> Result<()> {
        for token in &self.tokens {
            match token {
                Token::Text(text) => output.push_str(text),
                Token::Timestamp(format) => write!(output, "{}", event.timestamp.format(format))?,
                Token::Level(format) => render_level(event, format.as_deref(), output),
                Token::Message => output.push_str(&event.message),
                Token::NewLine => output.push('\n'),
                Token::Exception => {
                    if let Some(exception) = &event.exception {
                        output.push_str(exception);
                        if !exception.ends_with('\n') {
                            output.push('\n');
                        }
                    }
                }
                Token::Properties => {
                    let rendered: Vec<String> = event
                        .properties
                        .iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect();
                    output.push_str(&rendered.join(" "));
                }
                Token::Property { name, raw } => match event.properties.get(name) {
                    Some(value) => output.push_str(value),
                    None => output.push_str(raw),
                },
            }
        }
        Ok(())
    }
}

fn render_level(event: &LogEvent, format: Option<&str>, output: &mut String) {
    match format {
        Some("u3") => output.push_str(event.level.short_name()),
        Some("w3") => output.push_str(&event.level.short_name().to_lowercase()),
        Some("u") => output.push_str(&event.level.as_str().to_uppercase()),
        Some("w") => output.push_str(&event.level.as_str().to_lowercase()),
        _ => output.push_str(event.level.as_str()),
    }
}

fn parse(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = template;

    while let Some(c) = rest.chars().next() {
        if rest.starts_with("{{") {
            text.push('{');
            rest = &rest[2..];
        } else if rest.starts_with("}}") {
            text.push('}');
            rest = &rest[2..];
        } else if c == '{' {
            let Some(end) = rest.find('}') else {
                text.push_str(rest);
                break;
            };
            let raw = &rest[..=end];
            match parse_token(&rest[1..end], raw) {
                Some(token) => {
                    if !text.is_empty() {
                        tokens.push(Token::Text(std::mem::take(&mut text)));
                    }
                    tokens.push(token);
                }
                None => text.push_str(raw),
            }
            rest = &rest[end + 1..];
        } else {
            text.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    tokens
}

fn parse_token(content: &str, raw: &str) -> Option<Token> {
    let (name, format) = match content.split_once(':') {
        Some((name, format)) => (name, Some(format)),
        None => (content, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let token = match name {
        "Timestamp" => Token::Timestamp(
            format
                .map(dotnet_to_strftime)
                .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string()),
        ),
        "Level" => Token::Level(format.map(str::to_string)),
        "Message" => Token::Message,
        "NewLine" => Token::NewLine,
        "Exception" => Token::Exception,
        "Properties" => Token::Properties,
        _ => Token::Property {
            name: name.to_string(),
            raw: raw.to_string(),
        },
    };
    Some(token)
}

/// Translate a custom date format (`yyyy-MM-dd HH:mm:ss.fff zzz`) into a
/// chrono format string
fn dotnet_to_strftime(format: &str) -> String {
    if format == "o" || format == "O" {
        return "%Y-%m-%dT%H:%M:%S%.f%:z".to_string();
    }

    const SPECIFIERS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("M", "%-m"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("dd", "%d"),
        ("d", "%-d"),
        ("HH", "%H"),
        ("H", "%-H"),
        ("hh", "%I"),
        ("h", "%-I"),
        ("mm", "%M"),
        ("m", "%-M"),
        ("ss", "%S"),
        ("s", "%-S"),
        ("fffffffff", "%9f"),
        ("ffffff", "%6f"),
        ("fff", "%3f"),
        ("zzz", "%:z"),
        ("zz", "%:::z"),
        ("tt", "%p"),
    ];

    let mut out = String::new();
    let mut rest = format;

    'outer: while let Some(c) = rest.chars().next() {
        if c == '\'' || c == '"' {
            let literal_end = rest[1..].find(c).map(|i| i + 1).unwrap_or(rest.len());
            push_literal(&mut out, &rest[1..literal_end]);
            rest = rest.get(literal_end + 1..).unwrap_or("");
            continue;
        }
        for (specifier, strftime) in SPECIFIERS {
            if rest.starts_with(specifier) {
                out.push_str(strftime);
                rest = &rest[specifier.len()..];
                continue 'outer;
            }
        }
        push_literal(&mut out, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use chrono::{FixedOffset, TimeZone};

    fn render(template: &str, event: &LogEvent) -> String {
        let mut output = String::new();
        MessageTemplateFormatter::new(template)
            .format(event, &mut output)
            .unwrap();
        output
    }

    fn event() -> LogEvent {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let timestamp = offset.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
            + chrono::Duration::milliseconds(42);
        LogEvent::new(Level::Warning, "disk at 91%")
            .with_timestamp(timestamp)
            .with_property("host", "db-1")
    }

    #[test]
    fn test_level_and_message() {
        assert_eq!(render("[{Level}] {Message}", &event()), "[Warning] disk at 91%");
    }

    #[test]
    fn test_level_formats() {
        assert_eq!(render("{Level:u3}|{Level:w3}|{Level:u}", &event()), "WRN|wrn|WARNING");
    }

    #[test]
    fn test_default_body_template() {
        let rendered = render(super::super::DEFAULT_BODY_TEMPLATE, &event());
        assert_eq!(rendered, "2024-03-09 07:05:01.042 +02:00 [Warning] disk at 91%\n");
    }

    #[test]
    fn test_timestamp_default_and_custom_formats() {
        assert_eq!(render("{Timestamp}", &event()), "2024-03-09 07:05:01.042 +02:00");
        assert_eq!(render("{Timestamp:dd/MM/yy HH'h'mm}", &event()), "09/03/24 07h05");
        assert_eq!(render("{Timestamp:yyyy%}", &event()), "2024%");
    }

    #[test]
    fn test_timestamp_offset_formats() {
        assert_eq!(render("{Timestamp:HH zzz}", &event()), "07 +02:00");
        assert_eq!(render("{Timestamp:HH zz}", &event()), "07 +02");
    }

    #[test]
    fn test_exception_adds_trailing_newline() {
        let with_exception = event().with_exception("boom");
        assert_eq!(render("{Message}{NewLine}{Exception}", &with_exception), "disk at 91%\nboom\n");
        assert_eq!(render("{Message}{NewLine}{Exception}", &event()), "disk at 91%\n");
    }

    #[test]
    fn test_named_properties() {
        assert_eq!(render("{host}: {Message}", &event()), "db-1: disk at 91%");
        assert_eq!(render("{missing} {Properties}", &event()), "{missing} host=db-1");
    }

    #[test]
    fn test_escaped_and_unterminated_braces() {
        assert_eq!(render("{{Level}} {Level}", &event()), "{Level} Warning");
        assert_eq!(render("oops {Level", &event()), "oops {Level");
        assert_eq!(render("{not a token}", &event()), "{not a token}");
    }

    #[test]
    fn test_plain_subject_template() {
        assert_eq!(render("Log Messages", &event()), "Log Messages");
    }
}
