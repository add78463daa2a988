//! Trigger rule definitions
//!
//! Rules are stored in the `triggers` table; the string forms below are the
//! values kept in its `field`, `event` and `post_type` columns.
use crate::api::MessageData;

/// The message field a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    /// Author name
    Name,
    /// Author signature (tripcode)
    Trip,
    /// Origin tag (email field)
    Email,
    Subject,
    /// Post body
    Comment,
}

impl RuleField {
    /// Reads this field from a message
    pub fn extract(self, message: &MessageData) -> &str {
        match self {
            Self::Name => &message.name,
            Self::Trip => &message.trip,
            Self::Email => &message.email,
            Self::Subject => &message.subject,
            Self::Comment => &message.comment,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Trip => "trip",
            Self::Email => "email",
            Self::Subject => "subject",
            Self::Comment => "comment",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "trip" => Some(Self::Trip),
            "email" => Some(Self::Email),
            "subject" => Some(Self::Subject),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// Comparison applied between the field value and the rule phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
}

impl RuleOperator {
    /// Applies the comparison; both sides must already be case-normalized
    pub fn matches(self, value: &str, phrase: &str) -> bool {
        match self {
            Self::Contains => value.contains(phrase),
            Self::NotContains => !value.contains(phrase),
            Self::Equals => value == phrase,
            Self::NotEquals => value != phrase,
            Self::StartsWith => value.starts_with(phrase),
            Self::EndsWith => value.ends_with(phrase),
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "containsno",
            Self::Equals => "is",
            Self::NotEquals => "isnot",
            Self::StartsWith => "begins",
            Self::EndsWith => "ends",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "contains" => Some(Self::Contains),
            "containsno" => Some(Self::NotContains),
            "is" => Some(Self::Equals),
            "isnot" => Some(Self::NotEquals),
            "begins" => Some(Self::StartsWith),
            "ends" => Some(Self::EndsWith),
            _ => None,
        }
    }
}

/// Which posts of a thread a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    Any,
    /// Only the post opening the thread
    Opener,
    /// Only replies
    Reply,
}

impl PostType {
    pub fn applies_to(self, thread_number: i64, message: &MessageData) -> bool {
        match self {
            Self::Any => true,
            Self::Opener => message.is_opener(thread_number),
            Self::Reply => !message.is_opener(thread_number),
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Opener => "master",
            Self::Reply => "sub",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Self::Any),
            "master" => Some(Self::Opener),
            "sub" => Some(Self::Reply),
            _ => None,
        }
    }
}

/// A declarative condition/action pair evaluated against incoming posts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    pub id: i64,
    pub field: RuleField,
    pub operator: RuleOperator,
    pub phrase: String,
    pub case_sensitive: bool,
    pub post_type: PostType,
    /// Retain the thread when the rule matches
    pub retain_thread: bool,
    /// Tag attached to the thread when the rule matches
    pub tag_id: Option<i64>,
    pub active: bool,
}

impl TriggerRule {
    /// Creates an active, case-sensitive rule with no actions; use the
    /// builder methods to add them
    pub fn new(field: RuleField, operator: RuleOperator, phrase: impl Into<String>) -> Self {
        Self {
            id: 0,
            field,
            operator,
            phrase: phrase.into(),
            case_sensitive: true,
            post_type: PostType::Any,
            retain_thread: false,
            tag_id: None,
            active: true,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn post_type(mut self, post_type: PostType) -> Self {
        self.post_type = post_type;
        self
    }

    pub fn retain(mut self) -> Self {
        self.retain_thread = true;
        self
    }

    pub fn tag(mut self, tag_id: i64) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Checks the field condition against a message
    pub fn condition_holds(&self, message: &MessageData) -> bool {
        let value = self.field.extract(message);

        if self.case_sensitive {
            self.operator.matches(value, &self.phrase)
        } else {
            self.operator
                .matches(&value.to_lowercase(), &self.phrase.to_lowercase())
        }
    }
}
