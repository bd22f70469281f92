//! Text extraction from recognizer hypotheses.
//!
//! Recognizers hand back a JSON object per hypothesis, e.g.
//! `{"partial": "play mu"}` or `{"text": "play music"}`, occasionally with
//! only a `result` array.  The lookup order is:
//!
//! 1. the primary key (`text` for finals, `partial` for partials),
//! 2. the other key of that pair,
//! 3. `result`, rendered as JSON, unless it is empty or `[]`,
//! 4. otherwise the empty string.
//!
//! Payloads that are not a JSON object are taken verbatim (trimmed).
//! Malformed JSON is a [`HypothesisError`]; [`Hypothesis::text`] logs it and
//! yields an empty string so a bad payload never disturbs the session.

use serde_json::Value;
use thiserror::Error;

/// Malformed hypothesis payload.
#[derive(Debug, Error)]
pub enum HypothesisError {
    #[error("failed to parse hypothesis JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which field a hypothesis is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypothesisKind {
    Partial,
    Final,
}

impl HypothesisKind {
    fn primary_key(self) -> &'static str {
        match self {
            HypothesisKind::Partial => "partial",
            HypothesisKind::Final => "text",
        }
    }

    fn fallback_key(self) -> &'static str {
        match self {
            HypothesisKind::Partial => "text",
            HypothesisKind::Final => "partial",
        }
    }
}

/// Opaque hypothesis payload as produced by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis(String);

impl Hypothesis {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Extracted text, or an empty string when the payload is malformed.
    pub fn text(&self, kind: HypothesisKind) -> String {
        match self.try_text(kind) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("recognizer: {e}; payload {:?}", self.0);
                String::new()
            }
        }
    }

    pub fn try_text(&self, kind: HypothesisKind) -> Result<String, HypothesisError> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            log::debug!("recognizer: hypothesis is not JSON, using it verbatim");
            return Ok(trimmed.to_string());
        }

        let json: Value = serde_json::from_str(trimmed)?;

        for key in [kind.primary_key(), kind.fallback_key()] {
            if let Some(text) = json.get(key).and_then(field_text) {
                return Ok(text);
            }
        }

        if let Some(result) = json.get("result").filter(|v| !v.is_null()) {
            let rendered = result.to_string();
            let rendered = rendered.trim();
            if !rendered.is_empty() && rendered != "[]" {
                return Ok(rendered.to_string());
            }
        }

        log::debug!(
            "recognizer: no '{}' or fallback key in hypothesis",
            kind.primary_key()
        );
        Ok(String::new())
    }
}

/// Non-blank text of a field.  Non-string scalars are rendered as JSON.
fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(raw: &str) -> String {
        Hypothesis::new(raw).text(HypothesisKind::Partial)
    }

    fn final_text(raw: &str) -> String {
        Hypothesis::new(raw).text(HypothesisKind::Final)
    }

    #[test]
    fn primary_keys() {
        assert_eq!(partial(r#"{"partial": " play music "}"#), "play music");
        assert_eq!(final_text(r#"{"text": "next song"}"#), "next song");
    }

    #[test]
    fn falls_back_to_the_other_key() {
        assert_eq!(partial(r#"{"text": "hello"}"#), "hello");
        assert_eq!(final_text(r#"{"partial": "hello"}"#), "hello");
        // A blank primary key does not hide a populated fallback.
        assert_eq!(final_text(r#"{"text": "  ", "partial": "jarvis"}"#), "jarvis");
    }

    #[test]
    fn result_field_is_last_resort() {
        let raw = r#"{"result": [{"word": "hi", "conf": 1.0}]}"#;
        assert_eq!(final_text(raw), r#"[{"conf":1.0,"word":"hi"}]"#);
        assert_eq!(final_text(r#"{"result": []}"#), "");
    }

    #[test]
    fn missing_keys_give_empty_text() {
        assert_eq!(partial(r#"{"other": 1}"#), "");
        assert_eq!(partial("   "), "");
    }

    #[test]
    fn non_json_is_used_verbatim() {
        assert_eq!(partial("  next track "), "next track");
    }

    #[test]
    fn malformed_json_is_an_error_but_text_is_empty() {
        let hyp = Hypothesis::new(r#"{"partial": "unterminated}"#);
        assert!(matches!(
            hyp.try_text(HypothesisKind::Partial),
            Err(HypothesisError::Json(_))
        ));
        assert_eq!(hyp.text(HypothesisKind::Partial), "");
    }
}
