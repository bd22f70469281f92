//! Ordered, first-match-wins command rules.
//!
//! | # | Rule | Fires when | Side effect |
//! |---|------|------------|-------------|
//! | 1 | hello | a greeting **and** an assistant name appear | – |
//! | 2 | wake | text ends with a name and is shorter than `wake_max_len` | – |
//! | 3 | play/pause | `play/pause/stop/toggle music`, or exactly `play`/`pause` | `PlayPause` |
//! | 4 | next | `next song`, `next track`, or exactly `next` | `Next` |
//! | 5 | previous | `previous song/track`, `last song`, `go back`, or exactly `previous`/`back` | `Previous` |
//!
//! Partials grow while the user keeps talking, so the same utterance is
//! matched many times.  Matching is a pure function of the text; repeated
//! calls with the same input always give the same outcome.

use crate::config::CommandConfig;

use super::MediaKey;

const PLAY_PHRASES: &[&str] = &["play music", "pause music", "stop music", "toggle music"];
const PLAY_EXACT: &[&str] = &["play", "pause"];
const NEXT_PHRASES: &[&str] = &["next song", "next track"];
const NEXT_EXACT: &[&str] = &["next"];
const PREVIOUS_PHRASES: &[&str] = &["previous song", "last song", "previous track", "go back"];
const PREVIOUS_EXACT: &[&str] = &["previous", "back"];

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Lower-case and trim a hypothesis the way every rule expects it.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// CommandRule
// ---------------------------------------------------------------------------

/// One entry of the rule table.
pub struct CommandRule {
    name: &'static str,
    predicate: Predicate,
    response: String,
    side_effect: Option<MediaKey>,
}

impl CommandRule {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        response: impl Into<String>,
        side_effect: Option<MediaKey>,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
            response: response.into(),
            side_effect,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `text` must already be normalised.
    pub fn matches(&self, text: &str) -> bool {
        (self.predicate)(text)
    }
}

impl std::fmt::Debug for CommandRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRule")
            .field("name", &self.name)
            .field("response", &self.response)
            .field("side_effect", &self.side_effect)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MatchOutcome
// ---------------------------------------------------------------------------

/// Result of matching one partial hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    pub response: Option<String>,
    pub side_effect: Option<MediaKey>,
    /// Name of the rule that fired, for logging.
    pub rule: Option<&'static str>,
}

impl MatchOutcome {
    pub fn none() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// CommandMatcher
// ---------------------------------------------------------------------------

/// Immutable rule table.  Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct CommandMatcher {
    rules: Vec<CommandRule>,
}

impl CommandMatcher {
    /// Build a matcher from an explicit rule list (evaluated in order).
    pub fn new(rules: Vec<CommandRule>) -> Self {
        Self { rules }
    }

    /// The standard five-rule table, parameterised by the configured
    /// vocabulary and responses.
    pub fn from_config(config: &CommandConfig) -> Self {
        let names = lowercase_all(&config.assistant_names);
        let greetings = lowercase_all(&config.greetings);
        let wake_names = names.clone();
        let wake_max_len = config.wake_max_len;
        let responses = &config.responses;

        Self::new(vec![
            CommandRule::new(
                "hello",
                move |t: &str| contains_any(t, &greetings) && contains_any(t, &names),
                responses.hello.clone(),
                None,
            ),
            CommandRule::new(
                "wake",
                move |t: &str| {
                    wake_names.iter().any(|n| t.ends_with(n.as_str()))
                        && t.chars().count() < wake_max_len
                },
                responses.wake.clone(),
                None,
            ),
            CommandRule::new(
                "play_pause",
                phrase_rule(PLAY_PHRASES, PLAY_EXACT),
                responses.play_pause.clone(),
                Some(MediaKey::PlayPause),
            ),
            CommandRule::new(
                "next",
                phrase_rule(NEXT_PHRASES, NEXT_EXACT),
                responses.next.clone(),
                Some(MediaKey::Next),
            ),
            CommandRule::new(
                "previous",
                phrase_rule(PREVIOUS_PHRASES, PREVIOUS_EXACT),
                responses.previous.clone(),
                Some(MediaKey::Previous),
            ),
        ])
    }

    pub fn rules(&self) -> &[CommandRule] {
        &self.rules
    }

    /// Classify a raw partial hypothesis.  The text is normalised first.
    pub fn match_text(&self, partial: &str) -> MatchOutcome {
        let text = normalize(partial);
        if text.is_empty() {
            return MatchOutcome::none();
        }

        match self.rules.iter().find(|rule| rule.matches(&text)) {
            Some(rule) => MatchOutcome {
                matched: true,
                response: Some(rule.response.clone()),
                side_effect: rule.side_effect,
                rule: Some(rule.name),
            },
            None => MatchOutcome::none(),
        }
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| normalize(w))
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(w.as_str()))
}

fn phrase_rule(
    phrases: &'static [&'static str],
    exact: &'static [&'static str],
) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    move |t: &str| phrases.iter().any(|p| t.contains(p)) || exact.iter().any(|e| t == *e)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CommandMatcher {
        CommandMatcher::default()
    }

    fn rule_for(text: &str) -> Option<&'static str> {
        matcher().match_text(text).rule
    }

    #[test]
    fn hello_jarvis_hits_greeting_not_wake() {
        let outcome = matcher().match_text("hello jarvis");
        assert!(outcome.matched);
        assert_eq!(outcome.rule, Some("hello"));
        assert_eq!(outcome.response.as_deref(), Some("Hello Sir"));
        assert_eq!(outcome.side_effect, None);
    }

    #[test]
    fn greeting_accepts_misheard_names() {
        assert_eq!(rule_for("hallo charlie how are you"), Some("hello"));
        assert_eq!(rule_for("well hello java"), Some("hello"));
    }

    #[test]
    fn greeting_needs_a_name() {
        assert_eq!(rule_for("hello there"), None);
    }

    #[test]
    fn bare_name_is_a_wake_word() {
        let outcome = matcher().match_text("  Jarvis ");
        assert_eq!(outcome.rule, Some("wake"));
        assert_eq!(outcome.response.as_deref(), Some("Yes Sir?"));
        assert_eq!(rule_for("hey charlie"), Some("wake"));
    }

    #[test]
    fn long_text_ending_in_name_is_not_a_wake_word() {
        // 15 characters or more disables the wake rule.
        assert_eq!("okay then jarvis".len(), 16);
        assert_eq!(rule_for("okay then jarvis"), None);
        assert_eq!("ok now, jarvis".len(), 14);
        assert_eq!(rule_for("ok now, jarvis"), Some("wake"));
    }

    #[test]
    fn play_music_please_toggles_playback() {
        let outcome = matcher().match_text("play music please");
        assert_eq!(
            outcome,
            MatchOutcome {
                matched: true,
                response: Some("Toggling Music Playback…".into()),
                side_effect: Some(MediaKey::PlayPause),
                rule: Some("play_pause"),
            }
        );
    }

    #[test]
    fn play_pause_variants() {
        for text in ["pause music", "stop music now", "toggle music", "play", "Pause"] {
            assert_eq!(rule_for(text), Some("play_pause"), "{text}");
        }
        // Bare words only count as an exact utterance.
        assert_eq!(rule_for("play the drums"), None);
    }

    #[test]
    fn next_track_variants() {
        for text in ["next song", "skip to the next track", "next"] {
            let outcome = matcher().match_text(text);
            assert_eq!(outcome.side_effect, Some(MediaKey::Next), "{text}");
        }
        assert_eq!(rule_for("next week"), None);
    }

    #[test]
    fn previous_track_variants() {
        for text in ["previous song", "last song", "previous track", "go back", "previous", "back"] {
            let outcome = matcher().match_text(text);
            assert_eq!(outcome.side_effect, Some(MediaKey::Previous), "{text}");
        }
        assert_eq!(rule_for("welcome back home"), None);
    }

    #[test]
    fn earlier_rule_wins_over_later_rule() {
        // Satisfies both the play and next rules; play is listed first.
        assert_eq!(rule_for("play music then next song"), Some("play_pause"));
        // Short and ends in a name, but also a greeting: hello wins.
        assert_eq!(rule_for("hello java"), Some("hello"));
    }

    #[test]
    fn unmatched_and_empty_text() {
        assert_eq!(matcher().match_text("what time is it"), MatchOutcome::none());
        assert_eq!(matcher().match_text("   "), MatchOutcome::none());
    }

    #[test]
    fn matching_is_idempotent() {
        let m = matcher();
        for text in ["hello jarvis", "next", "nothing here", "play music please"] {
            assert_eq!(m.match_text(text), m.match_text(text));
        }
    }

    #[test]
    fn configured_vocabulary_is_used() {
        let mut config = CommandConfig::default();
        config.assistant_names = vec!["Friday".into()];
        config.responses.wake = "Boss?".into();
        let m = CommandMatcher::from_config(&config);

        assert_eq!(m.match_text("friday").response.as_deref(), Some("Boss?"));
        assert!(!m.match_text("jarvis").matched);
    }

    #[test]
    fn rule_table_is_ordered() {
        let names: Vec<_> = matcher().rules().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["hello", "wake", "play_pause", "next", "previous"]);
    }

    #[test]
    fn matcher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CommandMatcher>();
    }
}
