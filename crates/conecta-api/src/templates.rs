use conecta_types::events::NotificationEvent;
use conecta_types::models::InterestStatus;

use crate::mailer::Email;

/// Escapes text for interpolation into HTML bodies.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        "<!doctype html><html><body style=\"font-family:sans-serif\">{}\
         <p style=\"color:#888\">The Conecta team</p></body></html>",
        body
    )
}

pub fn render(to: String, event: &NotificationEvent) -> Email {
    let (subject, body) = match event {
        NotificationEvent::Welcome { name } => (
            "Welcome to Conecta".to_string(),
            format!(
                "<p>Hi {},</p><p>Your account is ready. Complete your profile so mentors \
                 and entrepreneurs can find you.</p>",
                escape_html(name)
            ),
        ),
        NotificationEvent::ConnectionRequested { requester_name } => (
            format!("{} wants to connect", requester_name),
            format!(
                "<p><strong>{}</strong> sent you a connection request.</p>",
                escape_html(requester_name)
            ),
        ),
        NotificationEvent::InterestReceived {
            opportunity_title,
            applicant_name,
            message,
        } => (
            format!("New interest in \"{}\"", opportunity_title),
            format!(
                "<p><strong>{}</strong> is interested in <em>{}</em>.</p><blockquote>{}</blockquote>",
                escape_html(applicant_name),
                escape_html(opportunity_title),
                escape_html(message)
            ),
        ),
        NotificationEvent::InterestReviewed {
            opportunity_title,
            status,
        } => {
            let verdict = match status {
                InterestStatus::Accepted => "accepted",
                _ => "declined",
            };
            (
                format!("Your interest in \"{}\" was {}", opportunity_title, verdict),
                format!(
                    "<p>Your interest in <em>{}</em> was {}.</p>",
                    escape_html(opportunity_title),
                    verdict
                ),
            )
        }
        NotificationEvent::PasswordReset { reset_url } => (
            "Reset your Conecta password".to_string(),
            format!(
                "<p>Use the link below to choose a new password. It expires in one hour.</p>\
                 <p><a href=\"{0}\">{0}</a></p>\
                 <p>If you did not ask for this, ignore this email.</p>",
                escape_html(reset_url)
            ),
        ),
    };

    Email {
        to,
        subject,
        html: layout(&body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_text_is_escaped() {
        let email = render(
            "ana@example.com".into(),
            &NotificationEvent::InterestReceived {
                opportunity_title: "Mural".into(),
                applicant_name: "<script>x</script>".into(),
                message: "a & b".into(),
            },
        );
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(email.html.contains("a &amp; b"));
        assert!(!email.html.contains("<script>"));
        assert_eq!(email.subject, "New interest in \"Mural\"");
    }

    #[test]
    fn rejected_reads_as_declined() {
        let email = render(
            "ben@example.com".into(),
            &NotificationEvent::InterestReviewed {
                opportunity_title: "Mural".into(),
                status: InterestStatus::Rejected,
            },
        );
        assert!(email.subject.ends_with("was declined"));
    }
}
