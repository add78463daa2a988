//! Thread payload parsing and post text cleaning

use crate::api::from_unix;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde::Deserialize;

/// Thread payload as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteThread {
    pub posts: Vec<RemotePost>,
}

/// A single post as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePost {
    pub no: i64,
    pub time: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub trip: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub sub: String,

    #[serde(default)]
    pub com: String,

    /// Remote file id of the attachment
    #[serde(default)]
    pub tim: Option<i64>,

    #[serde(default)]
    pub ext: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,
}

/// Attachment descriptor of a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_id: i64,
    pub extension: String,
    pub original_filename: String,
}

impl Attachment {
    /// True if the extension is a dot followed by ASCII letters and digits
    pub fn has_plain_extension(&self) -> bool {
        sanitize_extension(&self.extension).as_deref() == Some(self.extension.as_str())
    }

    /// File name under which the full image is stored
    pub fn image_name(&self) -> String {
        format!("{}{}", self.file_id, self.extension)
    }

    /// File name under which the thumbnail is stored
    pub fn thumbnail_name(&self) -> String {
        format!("{}.jpg", self.file_id)
    }
}

/// Parsed representation of one remote post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    pub number: i64,
    pub time: DateTime<Utc>,
    pub name: String,
    pub trip: String,
    pub email: String,
    pub country: String,
    pub subject: String,
    pub comment: String,
    pub attachment: Option<Attachment>,
}

impl MessageData {
    /// True if this message opens the given thread
    pub fn is_opener(&self, thread_number: i64) -> bool {
        self.number == thread_number
    }
}

impl From<&RemotePost> for MessageData {
    fn from(post: &RemotePost) -> Self {
        let attachment = match (post.tim, &post.ext) {
            (Some(file_id), Some(raw)) => match sanitize_extension(raw) {
                Some(extension) => Some(Attachment {
                    file_id,
                    extension,
                    original_filename: post.filename.clone().unwrap_or_default(),
                }),
                None => {
                    tracing::warn!("Post {}: ignoring attachment with extension {:?}", post.no, raw);
                    None
                }
            },
            _ => None,
        };

        Self {
            number: post.no,
            time: from_unix(post.time),
            name: post.name.clone(),
            trip: post.trip.clone(),
            email: post.email.clone(),
            country: post.country.clone(),
            subject: clean_markup(&post.sub),
            comment: clean_markup(&post.com),
            attachment,
        }
    }
}

/// Reduces a remote file extension to `.` plus the ASCII letters and digits
/// after its last dot
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_extension(raw: &str) -> Option<String> {
    let (_, tail) = raw.rsplit_once('.')?;

    let cleaned: String = tail.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(format!(".{}", cleaned))
    }
}

/// Strips the HTML markup the API uses in post text
///
/// Quote links, spans and other inline elements are reduced to their text,
/// `<br>` becomes a newline, `<wbr>` disappears, `<pre>` blocks are wrapped
/// in `[code]` tags and entities are unescaped.
pub fn clean_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(text);
    let mut out = String::with_capacity(text.len());
    collect_text(fragment.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            match child_element.value().name() {
                "br" => out.push('\n'),
                "wbr" => {}
                "pre" => {
                    out.push_str("[code]");
                    collect_text(child_element, out);
                    out.push_str("[/code]");
                }
                _ => collect_text(child_element, out),
            }
        }
    }
}
