use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::model::common::poll::{OptionText, PollStatus};

/// Poll options as submitted: either a list, or the raw contents of a
/// textarea with one option per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsInput {
    List(Vec<String>),
    Text(String),
}

impl Default for OptionsInput {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl OptionsInput {
    /// Trim every option and drop the blank ones, keeping order.
    /// Repeated options are kept as given.
    pub fn normalize(&self) -> Vec<OptionText> {
        let raw: Box<dyn Iterator<Item = &str> + '_> = match self {
            Self::List(items) => Box::new(items.iter().map(String::as_str)),
            Self::Text(text) => Box::new(text.lines()),
        };
        raw.map(str::trim)
            .filter(|option| !option.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The admin poll form, used for both creating and editing a poll.
///
/// Every field is optional at the parsing stage so that missing fields
/// are reported by [`PollForm::validate`] with a readable message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub options: OptionsInput,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Only read when editing; new polls are always drafts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Validated poll fields, ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollFields {
    pub title: String,
    pub description: String,
    pub prompt: String,
    pub options: Vec<OptionText>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

fn required(value: &str, name: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::invalid(format!("{name} is required")))
    } else {
        Ok(value.to_string())
    }
}

impl PollForm {
    /// Check the form, stopping at the first problem found.
    pub fn validate(&self) -> Result<PollFields> {
        let title = required(&self.title, "Title")?;
        let description = required(&self.description, "Description")?;
        let prompt = required(&self.prompt, "Prompt")?;

        let options = self.options.normalize();
        if options.len() < 2 {
            return Err(Error::invalid("A poll needs at least two options"));
        }

        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end <= start {
                return Err(Error::invalid("The end time must be after the start time"));
            }
        }

        Ok(PollFields {
            title,
            description,
            prompt,
            options,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        })
    }

    /// The requested status of an edited poll.
    pub fn status(&self) -> Result<PollStatus> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Err(Error::invalid("Status is required")),
            Some(status) => status.parse().map_err(Error::InvalidInput),
        }
    }
}

/// Accept an RFC 3339 timestamp, `null`, or an empty string meaning "not set".
fn lenient_datetime<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|datetime| Some(datetime.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}"))),
    }
}
