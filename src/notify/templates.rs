use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::models::Channel;

pub const ESTIMATE_REQUEST: &str = "estimate-request";
pub const CONTACT_US: &str = "contact-us";
pub const REQUEST_ASSIGNED: &str = "request-assigned";

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid placeholder regex")
});

#[derive(Clone, Debug)]
pub struct Template {
    pub id: String,
    pub subject: String,
    pub email_body: String,
    pub sms_body: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Template {
            id: ESTIMATE_REQUEST.to_string(),
            subject: "New estimate request from {{agentName}}".to_string(),
            email_body: "A new estimate request was submitted.\n\n\
                Request: {{requestId}}\n\
                Assigned to: {{assignedTo}}\n\
                Agent: {{agentName}} <{{agentEmail}}> {{agentPhone}}\n\
                Homeowner: {{homeownerName}} <{{homeownerEmail}}>\n\
                Property: {{propertyAddress}}\n\
                Product: {{product}}\n\
                Budget: {{budget}}\n\
                Lead source: {{leadSource}}\n\n\
                {{message}}\n"
                .to_string(),
            sms_body: "New estimate request {{requestId}} for {{propertyAddress}} from {{agentName}}"
                .to_string(),
        });
        registry.register(Template {
            id: CONTACT_US.to_string(),
            subject: "New contact message from {{name}}".to_string(),
            email_body: "{{name}} <{{email}}> {{phone}} wrote:\n\n\
                Subject: {{subject}}\n\
                Product: {{product}}\n\n\
                {{message}}\n"
                .to_string(),
            sms_body: "New contact message from {{name}} ({{email}})".to_string(),
        });
        registry.register(Template {
            id: REQUEST_ASSIGNED.to_string(),
            subject: "Request {{requestId}} was assigned to you".to_string(),
            email_body: "Hi {{assigneeName}},\n\n\
                Request {{requestId}} for {{propertyAddress}} is now yours.\n\
                Status: {{status}}\n"
                .to_string(),
            sms_body: "Request {{requestId}} ({{propertyAddress}}) was assigned to you".to_string(),
        });
        registry
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn contains(&self, template_id: &str) -> bool {
        self.templates.contains_key(template_id)
    }

    pub fn render(
        &self,
        template_id: &str,
        channel: Channel,
        payload: &Value,
    ) -> Option<RenderedMessage> {
        let template = self.templates.get(template_id)?;
        let body = match channel {
            Channel::Email => &template.email_body,
            Channel::Sms => &template.sms_body,
        };
        Some(RenderedMessage {
            subject: render_text(&template.subject, payload),
            body: render_text(body, payload),
        })
    }
}

/// Substitutes `{{key}}` and `{{nested.key}}` from the payload. Missing keys
/// and nulls render as empty text.
pub fn render_text(text: &str, payload: &Value) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let path = &caps[1];
            let value = path
                .split('.')
                .try_fold(payload, |current, key| current.get(key));
            match value {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_placeholders_from_payload() {
        let payload = json!({"name": "Ana", "lead": {"score": 80}, "phone": null});
        assert_eq!(
            render_text("Hi {{ name }} ({{lead.score}}) {{phone}}{{missing}}!", &payload),
            "Hi Ana (80) !"
        );
    }

    #[test]
    fn picks_body_by_channel() {
        let registry = TemplateRegistry::builtin();
        let payload = json!({"name": "Ana", "email": "ana@example.com"});
        let sms = registry.render(CONTACT_US, Channel::Sms, &payload).unwrap();
        assert_eq!(sms.body, "New contact message from Ana (ana@example.com)");
        let email = registry.render(CONTACT_US, Channel::Email, &payload).unwrap();
        assert_eq!(email.subject, "New contact message from Ana");
        assert!(registry.render("nope", Channel::Email, &payload).is_none());
    }
}
