// inspection-analyzer-rs/src/args.rs
// Command-line parsing for the batch analyzer

use std::fmt;

pub const USAGE: &str =
    "usage: inspection-analyzer --question <text> [--answer <text>] [--set <key>=<value>]... <media-url>...";

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub question: String,
    pub answer: Option<String>,
    pub media_urls: Vec<String>,
    /// Configuration keys that take precedence over the environment
    pub overrides: Vec<(String, String)>,
}

/// Command-line errors; all of them exit with status 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    Help,
    MissingValue(String),
    UnknownFlag(String),
    InvalidOverride(String),
    MissingQuestion,
    NoMedia,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::Help => write!(f, "{}", USAGE),
            UsageError::MissingValue(flag) => write!(f, "{} requires a value\n{}", flag, USAGE),
            UsageError::UnknownFlag(flag) => write!(f, "unknown option {}\n{}", flag, USAGE),
            UsageError::InvalidOverride(value) => write!(f, "expected <key>=<value>, got {}\n{}", value, USAGE),
            UsageError::MissingQuestion => write!(f, "--question is required\n{}", USAGE),
            UsageError::NoMedia => write!(f, "at least one media URL is required\n{}", USAGE),
        }
    }
}

impl std::error::Error for UsageError {}

impl CliArgs {
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut question = None;
        let mut answer = None;
        let mut media_urls = Vec::new();
        let mut overrides = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Err(UsageError::Help),
                "-q" | "--question" => {
                    question = Some(args.next().ok_or_else(|| UsageError::MissingValue(arg.clone()))?);
                }
                "-a" | "--answer" => {
                    answer = Some(args.next().ok_or_else(|| UsageError::MissingValue(arg.clone()))?);
                }
                "-s" | "--set" => {
                    let value = args.next().ok_or_else(|| UsageError::MissingValue(arg.clone()))?;
                    let (key, setting) = value
                        .split_once('=')
                        .filter(|(key, _)| !key.trim().is_empty())
                        .ok_or_else(|| UsageError::InvalidOverride(value.clone()))?;
                    overrides.push((key.trim().to_string(), setting.to_string()));
                }
                flag if flag.starts_with('-') => return Err(UsageError::UnknownFlag(flag.to_string())),
                _ => media_urls.push(arg),
            }
        }

        let question = question
            .filter(|q| !q.trim().is_empty())
            .ok_or(UsageError::MissingQuestion)?;
        if media_urls.is_empty() {
            return Err(UsageError::NoMedia);
        }

        Ok(Self {
            question,
            answer,
            media_urls,
            overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, UsageError> {
        CliArgs::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_parses_question_answer_and_urls() {
        let args = parse(&["--question", "Extintor ok?", "-a", "Sim", "a.jpg", "b.mp4"]).unwrap();

        assert_eq!(args.question, "Extintor ok?");
        assert_eq!(args.answer.as_deref(), Some("Sim"));
        assert_eq!(args.media_urls, vec!["a.jpg".to_string(), "b.mp4".to_string()]);
        assert!(args.overrides.is_empty());
    }

    #[test]
    fn test_collects_config_overrides() {
        let args = parse(&["-q", "q", "--set", "sequential_inter_item_delay=500ms", "-s", "analysis_api_key=a=b", "a.jpg"])
            .unwrap();

        assert_eq!(
            args.overrides,
            vec![
                ("sequential_inter_item_delay".to_string(), "500ms".to_string()),
                ("analysis_api_key".to_string(), "a=b".to_string()),
            ]
        );
        assert_eq!(
            parse(&["-q", "q", "--set", "no-equals", "a.jpg"]),
            Err(UsageError::InvalidOverride("no-equals".to_string()))
        );
        assert_eq!(
            parse(&["-q", "q", "--set", "=value", "a.jpg"]),
            Err(UsageError::InvalidOverride("=value".to_string()))
        );
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(parse(&["a.jpg"]), Err(UsageError::MissingQuestion));
        assert_eq!(parse(&["--question", "q"]), Err(UsageError::NoMedia));
        assert_eq!(parse(&["--question"]), Err(UsageError::MissingValue("--question".to_string())));
        assert_eq!(parse(&["--verbose"]), Err(UsageError::UnknownFlag("--verbose".to_string())));
        assert_eq!(parse(&["-h"]), Err(UsageError::Help));
    }
}
