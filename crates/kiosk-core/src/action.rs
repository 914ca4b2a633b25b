//! The structured action protocol returned by the dialogue agent.
//!
//! Actions arrive as raw JSON objects tagged by `type`. Each element is parsed
//! on its own so that one unknown or malformed entry never poisons the list.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Every tag the dispatcher understands, upper-case.
pub const KNOWN_ACTIONS: &[&str] = &[
    "NAVIGATE",
    "SHOW_RECOMMENDATIONS",
    "SELECT_MENU_BY_NAME",
    "SET_QTY",
    "INCREMENT_QTY",
    "DECREMENT_QTY",
    "ADD_TO_CART",
    "REMOVE_FROM_CART",
    "READ_BACK_SUMMARY",
    "ORDER",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Navigate {
        target: String,
    },
    ShowRecommendations {
        #[serde(default)]
        items: Vec<Recommendation>,
    },
    SelectMenuByName {
        name: String,
    },
    SetQty {
        #[serde(deserialize_with = "lenient_number")]
        value: f64,
    },
    IncrementQty {},
    DecrementQty {},
    AddToCart {},
    RemoveFromCart {
        #[serde(alias = "menu_id", alias = "menuId", deserialize_with = "lenient_id")]
        id: String,
    },
    ReadBackSummary {},
    Order {},
}

/// A recommended item: either a bare name or an object with a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recommendation {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default, alias = "menuId", deserialize_with = "lenient_optional_id")]
        menu_id: Option<String>,
    },
}

impl Recommendation {
    pub fn name(&self) -> &str {
        match self {
            Recommendation::Name(name) => name,
            Recommendation::Detailed { name, .. } => name,
        }
    }
}

/// Why a raw action could not become an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("action is not a JSON object")]
    NotAnObject,

    #[error("action has no string `type`")]
    MissingType,

    #[error("unknown action type `{0}`")]
    Unknown(String),

    #[error("malformed {kind} action: {reason}")]
    Malformed { kind: String, reason: String },
}

impl Action {
    /// Parse one raw action. The tag is matched case-insensitively.
    pub fn parse(raw: &Value) -> Result<Action, ActionError> {
        let object = raw.as_object().ok_or(ActionError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_ascii_uppercase())
            .ok_or(ActionError::MissingType)?;

        if !KNOWN_ACTIONS.contains(&kind.as_str()) {
            return Err(ActionError::Unknown(kind));
        }

        let mut normalized = object.clone();
        normalized.insert("type".to_string(), Value::String(kind.clone()));
        serde_json::from_value(Value::Object(normalized)).map_err(|e| ActionError::Malformed {
            kind,
            reason: e.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "NAVIGATE",
            Action::ShowRecommendations { .. } => "SHOW_RECOMMENDATIONS",
            Action::SelectMenuByName { .. } => "SELECT_MENU_BY_NAME",
            Action::SetQty { .. } => "SET_QTY",
            Action::IncrementQty {} => "INCREMENT_QTY",
            Action::DecrementQty {} => "DECREMENT_QTY",
            Action::AddToCart {} => "ADD_TO_CART",
            Action::RemoveFromCart { .. } => "REMOVE_FROM_CART",
            Action::ReadBackSummary {} => "READ_BACK_SUMMARY",
            Action::Order {} => "ORDER",
        }
    }
}

/// Agents sometimes send quantities as strings ("2").
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("`{}` is not a number", s))),
    }
}

/// Menu ids may be numeric on the wire; they are rendered the way the
/// catalog renders them so cart lookups line up.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl From<IdOrNumber> for String {
    fn from(id: IdOrNumber) -> Self {
        match id {
            IdOrNumber::Text(s) => s,
            IdOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdOrNumber::deserialize(deserializer).map(String::from)
}

fn lenient_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdOrNumber>::deserialize(deserializer)?.map(String::from))
}
