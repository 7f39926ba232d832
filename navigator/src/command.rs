use region_pilot_common::config::CommandsConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Everything the operator can ask the navigator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Next,
    Previous,
    Focus,
    Refresh,
    Select,
    Full,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Next,
        Action::Previous,
        Action::Focus,
        Action::Refresh,
        Action::Select,
        Action::Full,
    ];

    /// The canonical spoken name, always accepted.
    pub fn name(self) -> &'static str {
        match self {
            Action::Next => "next",
            Action::Previous => "previous",
            Action::Focus => "focus",
            Action::Refresh => "refresh",
            Action::Select => "select",
            Action::Full => "full",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = CommandTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.name() == wanted)
            .ok_or_else(|| CommandTableError::UnknownAction(s.to_string()))
    }
}

/// A usable recognition result: an action or a request to end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Action(Action),
    Sentinel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Action(Action),
    /// Carries the sentinel word that was heard.
    Sentinel(String),
    Invalid,
}

impl Classification {
    pub fn into_command(self) -> Option<Command> {
        match self {
            Classification::Action(action) => Some(Command::Action(action)),
            Classification::Sentinel(word) => Some(Command::Sentinel(word)),
            Classification::Invalid => None,
        }
    }
}

/// Maps recognized utterances to commands.
///
/// Built once from an explicit synonym table. Every word maps to exactly one
/// action and no synonym may double as a sentinel word.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    words: HashMap<String, Action>,
    sentinels: Vec<String>,
}

impl CommandInterpreter {
    pub fn new<I>(synonyms: I, sentinels: Vec<String>) -> Result<Self, CommandTableError>
    where
        I: IntoIterator<Item = (Action, Vec<String>)>,
    {
        let mut words: HashMap<String, Action> = Action::ALL
            .into_iter()
            .map(|action| (action.name().to_string(), action))
            .collect();

        for (action, extra) in synonyms {
            for raw in extra {
                let word = normalize(&raw);
                if word.is_empty() {
                    return Err(CommandTableError::Blank(action));
                }
                match words.get(&word) {
                    Some(&existing) if existing != action => {
                        return Err(CommandTableError::Conflict {
                            word,
                            first: existing,
                            second: action,
                        });
                    }
                    Some(_) => {}
                    None => {
                        words.insert(word, action);
                    }
                }
            }
        }

        let mut normalized_sentinels = Vec::with_capacity(sentinels.len());
        for raw in sentinels {
            let word = normalize(&raw);
            if word.is_empty() || word.split_whitespace().count() != 1 {
                return Err(CommandTableError::BadSentinel(raw));
            }
            if let Some(&action) = words.get(&word) {
                return Err(CommandTableError::SentinelConflict { word, action });
            }
            if !normalized_sentinels.contains(&word) {
                normalized_sentinels.push(word);
            }
        }

        Ok(Self {
            words,
            sentinels: normalized_sentinels,
        })
    }

    pub fn from_config(config: &CommandsConfig) -> Result<Self, CommandTableError> {
        let mut synonyms = Vec::with_capacity(config.synonyms.len());
        for (name, words) in &config.synonyms {
            synonyms.push((name.parse::<Action>()?, words.clone()));
        }
        Self::new(synonyms, config.sentinels.clone())
    }

    pub fn sentinels(&self) -> &[String] {
        &self.sentinels
    }

    /// Classify one recognized utterance.
    ///
    /// An exact (case-insensitive) match on a configured word wins. Otherwise
    /// the first word of the utterance that is a sentinel ends the session.
    pub fn classify(&self, raw_text: &str) -> Classification {
        let text = normalize(raw_text);
        if let Some(&action) = self.words.get(&text) {
            return Classification::Action(action);
        }
        text.split_whitespace()
            .find(|word| self.sentinels.iter().any(|s| s == word))
            .map(|word| Classification::Sentinel(word.to_string()))
            .unwrap_or(Classification::Invalid)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum CommandTableError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("blank synonym configured for {0}")]
    Blank(Action),
    #[error("synonym {word:?} is claimed by both {first} and {second}")]
    Conflict {
        word: String,
        first: Action,
        second: Action,
    },
    #[error("sentinel {0:?} must be a single word")]
    BadSentinel(String),
    #[error("sentinel {word:?} is also a word for {action}")]
    SentinelConflict { word: String, action: Action },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_interpreter() -> CommandInterpreter {
        CommandInterpreter::from_config(&CommandsConfig::default()).unwrap()
    }

    #[test]
    fn canonical_names_always_accepted() {
        let interpreter = CommandInterpreter::new(Vec::new(), Vec::new()).unwrap();
        for action in Action::ALL {
            assert_eq!(interpreter.classify(action.name()), Classification::Action(action));
        }
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        let interpreter = default_interpreter();
        assert_eq!(interpreter.classify("  NeXt \n"), Classification::Action(Action::Next));
        assert_eq!(interpreter.classify("Zoom"), Classification::Action(Action::Focus));
    }

    #[test]
    fn every_synonym_matches_its_canonical_name() {
        let config = CommandsConfig::default();
        let interpreter = CommandInterpreter::from_config(&config).unwrap();
        for (name, words) in &config.synonyms {
            let canonical = interpreter.classify(name);
            assert!(matches!(canonical, Classification::Action(_)));
            for word in words {
                assert_eq!(interpreter.classify(word), canonical, "synonym {word:?}");
            }
        }
    }

    #[test]
    fn sentinel_found_inside_sentence() {
        let interpreter = default_interpreter();
        assert_eq!(
            interpreter.classify("quit now"),
            Classification::Sentinel("quit".into())
        );
        assert_eq!(
            interpreter.classify("please turn it OFF and stop"),
            Classification::Sentinel("off".into())
        );
    }

    #[test]
    fn unknown_phrase_is_invalid() {
        let interpreter = default_interpreter();
        assert_eq!(
            interpreter.classify("please select that one"),
            Classification::Invalid
        );
        assert_eq!(interpreter.classify(""), Classification::Invalid);
        // words only count as exact matches
        assert_eq!(interpreter.classify("next one"), Classification::Invalid);
    }

    #[test]
    fn conflicting_synonym_rejected() {
        let err = CommandInterpreter::new(
            vec![
                (Action::Next, vec!["next".into(), "no".into(), "last".into()]),
                (Action::Previous, vec!["previous".into(), "no".into()]),
            ],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandTableError::Conflict { ref word, first: Action::Next, second: Action::Previous } if word == "no"
        ));
    }

    #[test]
    fn synonym_shadowing_canonical_name_rejected() {
        let err = CommandInterpreter::new(vec![(Action::Full, vec!["Select".into()])], Vec::new())
            .unwrap_err();
        assert!(matches!(err, CommandTableError::Conflict { .. }));
    }

    #[test]
    fn synonym_used_as_sentinel_rejected() {
        let err = CommandInterpreter::new(
            vec![(Action::Select, vec!["stop".into()])],
            vec!["stop".into()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CommandTableError::SentinelConflict { action: Action::Select, .. }
        ));
    }

    #[test]
    fn bad_table_entries_rejected() {
        assert!(matches!(
            CommandInterpreter::new(vec![(Action::Next, vec!["  ".into()])], Vec::new()),
            Err(CommandTableError::Blank(Action::Next))
        ));
        assert!(matches!(
            CommandInterpreter::new(Vec::new(), vec!["shut down".into()]),
            Err(CommandTableError::BadSentinel(_))
        ));
        let mut config = CommandsConfig::default();
        config.synonyms.insert("jump".into(), vec!["hop".into()]);
        assert!(matches!(
            CommandInterpreter::from_config(&config),
            Err(CommandTableError::UnknownAction(_))
        ));
    }

    #[test]
    fn duplicate_synonym_for_same_action_is_fine() {
        let interpreter = CommandInterpreter::new(
            vec![(Action::Next, vec!["no".into(), "NO".into(), "next".into()])],
            vec!["stop".into(), "STOP".into()],
        )
        .unwrap();
        assert_eq!(interpreter.classify("no"), Classification::Action(Action::Next));
        assert_eq!(interpreter.sentinels(), &["stop".to_string()]);
    }

    const FILLER: &[&str] = &["please", "the", "robot", "arm", "now", "one", "that", "okay"];

    proptest! {
        #[test]
        fn sentinel_anywhere_in_utterance_wins(
            before in proptest::collection::vec(proptest::sample::select(FILLER), 0..5),
            after in proptest::collection::vec(proptest::sample::select(FILLER), 0..5),
            sentinel in proptest::sample::select(&["stop", "end", "quit", "off", "exit"][..]),
            shout in any::<bool>(),
        ) {
            let interpreter = default_interpreter();
            let mut words: Vec<&str> = before.clone();
            words.push(sentinel);
            words.extend(after.iter().copied());
            let mut text = words.join(" ");
            if shout {
                text = text.to_uppercase();
            }
            prop_assert_eq!(
                interpreter.classify(&text),
                Classification::Sentinel(sentinel.to_string())
            );
        }
    }
}
