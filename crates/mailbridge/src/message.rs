//! Message model carried in `send` payloads.
//!
//! Field names follow the wire format (`replyTo`, `mimeType`). The worker
//! decodes the payload back into an [`Email`] and re-validates it, since the
//! supervisor is not the only possible peer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("at least one recipient (to, cc, bcc) must be specified")]
    NoRecipients,
    #[error("invalid message payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

impl From<&str> for EmailAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// A file attached by path; the worker reads it at delivery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Embedded in the body (referenced by `cid:<name>`) rather than attached.
    #[serde(default)]
    pub inline: bool,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            mime_type: None,
            inline: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    pub from: EmailAddress,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub bcc: Vec<EmailAddress>,
    #[serde(default)]
    pub reply_to: Vec<EmailAddress>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Email {
    pub fn builder(from: impl Into<EmailAddress>) -> EmailBuilder {
        EmailBuilder::new(from.into())
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(MessageError::NoRecipients);
        }
        Ok(())
    }

    /// Decode and validate a `send` payload.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, MessageError> {
        let email: Self = serde_json::from_value(payload)
            .map_err(|e| MessageError::InvalidPayload(e.to_string()))?;
        email.validate()?;
        Ok(email)
    }

    pub fn to_payload(&self) -> serde_json::Value {
        // Plain structs of strings and lists always serialize.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub struct EmailBuilder {
    email: Email,
}

impl EmailBuilder {
    fn new(from: EmailAddress) -> Self {
        Self {
            email: Email {
                from,
                to: Vec::new(),
                cc: Vec::new(),
                bcc: Vec::new(),
                reply_to: Vec::new(),
                subject: None,
                text: None,
                html: None,
                attachments: Vec::new(),
            },
        }
    }

    pub fn to(mut self, address: impl Into<EmailAddress>) -> Self {
        self.email.to.push(address.into());
        self
    }

    pub fn cc(mut self, address: impl Into<EmailAddress>) -> Self {
        self.email.cc.push(address.into());
        self
    }

    pub fn bcc(mut self, address: impl Into<EmailAddress>) -> Self {
        self.email.bcc.push(address.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<EmailAddress>) -> Self {
        self.email.reply_to.push(address.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.email.subject = Some(subject.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.email.text = Some(text.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.email.html = Some(html.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.email.attachments.push(attachment);
        self
    }

    pub fn build(self) -> Result<Email, MessageError> {
        self.email.validate()?;
        Ok(self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Email {
        Email::builder(EmailAddress::named("shado@example.com", "Shado"))
            .to(EmailAddress::named("someone@example.com", "Someone"))
            .cc("noone@example.com")
            .reply_to("replies@example.com")
            .subject("Test Email")
            .text("This is a test email.")
            .html("<p>This is a test email.</p>")
            .attach(
                Attachment::new("/tmp/file.txt")
                    .with_name("file.txt")
                    .with_mime_type("text/plain"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_a_recipient() {
        let err = Email::builder("a@example.com").subject("x").build().unwrap_err();
        assert_eq!(err, MessageError::NoRecipients);
    }

    #[test]
    fn bcc_alone_is_enough() {
        assert!(Email::builder("a@example.com").bcc("b@example.com").build().is_ok());
    }

    #[test]
    fn payload_uses_wire_field_names() {
        insta::assert_json_snapshot!(sample(), @r#"
        {
          "from": {
            "address": "shado@example.com",
            "name": "Shado"
          },
          "to": [
            {
              "address": "someone@example.com",
              "name": "Someone"
            }
          ],
          "cc": [
            {
              "address": "noone@example.com",
              "name": null
            }
          ],
          "bcc": [],
          "replyTo": [
            {
              "address": "replies@example.com",
              "name": null
            }
          ],
          "subject": "Test Email",
          "text": "This is a test email.",
          "html": "<p>This is a test email.</p>",
          "attachments": [
            {
              "path": "/tmp/file.txt",
              "name": "file.txt",
              "mimeType": "text/plain",
              "inline": false
            }
          ]
        }
        "#);
    }

    #[test]
    fn payload_decodes_back() {
        let email = sample();
        assert_eq!(Email::from_payload(email.to_payload()).unwrap(), email);
    }

    #[test]
    fn sparse_payload_fills_defaults() {
        let email = Email::from_payload(json!({
            "from": {"address": "a@example.com"},
            "to": [{"address": "b@example.com"}]
        }))
        .unwrap();

        assert_eq!(email.to, vec![EmailAddress::new("b@example.com")]);
        assert!(email.attachments.is_empty());
        assert_eq!(email.subject, None);
    }

    #[test]
    fn payload_without_recipients_is_rejected() {
        let err = Email::from_payload(json!({"from": {"address": "a@example.com"}})).unwrap_err();
        assert_eq!(err, MessageError::NoRecipients);
    }

    #[test]
    fn payload_without_sender_is_rejected() {
        let err = Email::from_payload(json!({"to": [{"address": "b@example.com"}]})).unwrap_err();
        assert!(matches!(err, MessageError::InvalidPayload(_)));
    }
}
