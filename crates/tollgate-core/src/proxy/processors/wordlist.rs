//! Wordlist audit / redact / block on request and response text.

use serde_json::Value;
use std::sync::Arc;
use tollgate_types::{PolicyAction, StatsRecord};

use super::value_str;
use crate::error::{AppError, AppResult};
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::headers::{X_TOLLGATE_REQUEST_WORDLIST, X_TOLLGATE_RESPONSE_WORDLIST};
use crate::proxy::pipeline::{body, CallState, Processor};
use crate::proxy::wordlist::{WordlistMatcher, WordlistSource};

/// List name that selects `POLICY_CUSTOM_WORDLIST` instead of a file.
const CUSTOM_LIST: &str = "custom";

/// Parse `name:action,name:action`. A missing action means audit.
pub fn parse_wordlist_selection(selection: &str) -> AppResult<Vec<(String, PolicyAction)>> {
    selection
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> AppResult<(String, PolicyAction)> {
            let (name, action) = match entry.split_once(':') {
                Some((name, action)) => {
                    (name.trim(), action.parse::<PolicyAction>().map_err(AppError::Config)?)
                },
                None => (entry, PolicyAction::Audit),
            };
            Ok((name.to_string(), action))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Request,
    Response,
}

/// Scans one side of the call against the selected wordlists.
pub struct WordlistProcessor {
    target: Target,
    matcher: Arc<WordlistMatcher>,
}

impl WordlistProcessor {
    pub fn request(matcher: Arc<WordlistMatcher>) -> Self {
        Self { target: Target::Request, matcher }
    }

    pub fn response(matcher: Arc<WordlistMatcher>) -> Self {
        Self { target: Target::Response, matcher }
    }

    fn label(&self) -> &'static str {
        match self.target {
            Target::Request => "Request",
            Target::Response => "Response",
        }
    }
}

impl Processor for WordlistProcessor {
    fn name(&self) -> &'static str {
        match self.target {
            Target::Request => "request_wordlist",
            Target::Response => "response_wordlist",
        }
    }

    fn header(&self) -> Option<&'static str> {
        Some(match self.target {
            Target::Request => X_TOLLGATE_REQUEST_WORDLIST,
            Target::Response => X_TOLLGATE_RESPONSE_WORDLIST,
        })
    }

    fn config_field(&self) -> Option<&'static str> {
        Some(match self.target {
            Target::Request => "POLICY_REQUEST_WORDLIST",
            Target::Response => "POLICY_RESPONSE_WORDLIST",
        })
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(selection) = value_str(value) else {
            return Ok(None);
        };
        let lists = parse_wordlist_selection(selection)?;
        if lists.is_empty() {
            return Ok(None);
        }

        let settings = call.config.settings();
        let marker = settings.redaction_string.as_str();
        let mut slots = match self.target {
            Target::Request => body::request_texts_mut(call.request),
            Target::Response => match call.response.as_deref_mut() {
                Some(response) => body::response_texts_mut(response),
                None => return Ok(None),
            },
        };

        for (name, action) in &lists {
            let source = if name == CUSTOM_LIST {
                WordlistSource::Custom(&settings.policy_custom_wordlist)
            } else {
                WordlistSource::Named(name)
            };

            let mut hit = false;
            for slot in slots.iter_mut() {
                let result = self.matcher.scan(source, slot.as_str(), marker)?;
                if !result.matched {
                    continue;
                }
                hit = true;
                tracing::debug!("Wordlist '{}' matched {:?}", name, result.patterns);
                if *action == PolicyAction::Redact {
                    **slot = result.redacted;
                }
            }

            if hit {
                stats.flag(
                    self.name(),
                    *action,
                    format!("{} matched the '{}' wordlist", self.label(), name),
                );
            }
        }
        Ok(None)
    }
}
