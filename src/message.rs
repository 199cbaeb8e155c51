//! Composition of the mail relayed for a submission.

use crate::error::Error;
use crate::replies::{self, Language};
use crate::submission::Submission;
use lettre::Message;
use lettre::message::{Mailbox, MultiPart};
use std::collections::HashSet;

/// Elements whose text content is dropped together with the tags.
const DISCARDED_CONTENT_TAGS: [&str; 5] = ["script", "style", "noscript", "textarea", "option"];

/// Removes every tag and attribute from `text`, keeping only escaped text content.
pub fn strip_markup(text: &str) -> String {
    ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(DISCARDED_CONTENT_TAGS))
        .clean(text)
        .to_string()
}

/// Subject and bodies of the relayed mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParts {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl MessageParts {
    /// Renders a submission. Only the HTML body sees the sanitized message;
    /// the plain-text body carries it verbatim.
    pub fn render(submission: &Submission, language: Language) -> Self {
        let label = replies::from_label(language);
        let email = submission.email.to_string();

        Self {
            subject: replies::subject(&submission.name, language),
            text: format!("{label} {email}\n\n{}", submission.message),
            html: format!(
                "<p><strong>{label}</strong> {}</p><p>{}</p>",
                strip_markup(&email),
                strip_markup(&submission.message)
            ),
        }
    }
}

/// Builds the `multipart/alternative` mail sent to the site owner.
///
/// Replies go straight to the visitor.
pub fn compose(
    submission: &Submission,
    sender: &Mailbox,
    recipient: &Mailbox,
    language: Language,
) -> Result<Message, Error> {
    let parts = MessageParts::render(submission, language);
    let reply_to = Mailbox::new(Some(submission.name.clone()), submission.email.clone());

    let message = Message::builder()
        .from(sender.clone())
        .to(recipient.clone())
        .reply_to(reply_to)
        .subject(parts.subject)
        .multipart(MultiPart::alternative_plain_html(parts.text, parts.html))?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailparse::{MailHeaderMap, parse_mail};
    use rstest::*;
    use testresult::TestResult;

    #[fixture]
    fn submission() -> Submission {
        Submission {
            name: "Jane".to_string(),
            email: "jane@x.com".parse().expect("valid address"),
            message: "<script>alert(1)</script>hello".to_string(),
        }
    }

    #[rstest]
    #[case("<script>alert(1)</script>hello", "hello")]
    #[case("<b onclick=\"steal()\">bold</b> move", "bold move")]
    #[case("<a href=\"https://evil.example\">link</a>", "link")]
    #[case("<style>p { color: red }</style>text", "text")]
    #[case("<img src=x onerror=alert(1)>after", "after")]
    #[case("plain text", "plain text")]
    #[case("1 < 2 & 3", "1 &lt; 2 &amp; 3")]
    fn test_strip_markup(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_markup(input), expected);
    }

    #[rstest]
    fn test_render_sanitizes_html_only(submission: Submission) {
        let parts = MessageParts::render(&submission, Language::En);
        assert_eq!(parts.subject, "Website message from Jane");
        assert_eq!(
            parts.text,
            "From: jane@x.com\n\n<script>alert(1)</script>hello"
        );
        assert_eq!(
            parts.html,
            "<p><strong>From:</strong> jane@x.com</p><p>hello</p>"
        );
    }

    #[rstest]
    fn test_render_portuguese(submission: Submission) {
        let parts = MessageParts::render(&submission, Language::Pt);
        assert_eq!(parts.subject, "Mensagem do site de Jane");
        assert!(parts.text.starts_with("De: jane@x.com\n\n"));
        assert!(parts.html.starts_with("<p><strong>De:</strong>"));
    }

    #[rstest]
    fn test_compose(submission: Submission) -> TestResult {
        let sender: Mailbox = "site@example.org".parse()?;
        let recipient: Mailbox = "owner@example.org".parse()?;
        let message = compose(&submission, &sender, &recipient, Language::En)?;

        let raw = message.formatted();
        let parsed = parse_mail(&raw)?;
        assert_eq!(
            parsed.headers.get_first_value("Subject").as_deref(),
            Some("Website message from Jane")
        );
        assert_eq!(
            parsed.headers.get_first_value("From").as_deref(),
            Some("site@example.org")
        );
        assert_eq!(
            parsed.headers.get_first_value("To").as_deref(),
            Some("owner@example.org")
        );
        assert!(
            parsed
                .headers
                .get_first_value("Reply-To")
                .is_some_and(|v| v.contains("jane@x.com"))
        );
        assert_eq!(parsed.ctype.mimetype, "multipart/alternative");

        let text = parsed
            .subparts
            .iter()
            .find(|part| part.ctype.mimetype == "text/plain")
            .expect("text/plain part");
        let html = parsed
            .subparts
            .iter()
            .find(|part| part.ctype.mimetype == "text/html")
            .expect("text/html part");
        assert!(text.get_body()?.contains("<script>alert(1)</script>hello"));
        let html_body = html.get_body()?;
        assert!(html_body.contains("<p>hello</p>"));
        assert!(!html_body.contains("script"));
        Ok(())
    }
}
