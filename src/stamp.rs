//! Rewrites the "last updated" section of a markdown document.
//!
//! The section starts at a fixed heading line and runs until the next heading
//! of the same or higher rank (`#` or `##`), or the end of the document:
//!
//! ```text
//! ## 🕒 最后更新时间
//!
//! **UTC**: `2024-05-01 04:00:00`
//! **北京时间**: `2024-05-01 12:00:00`
//!
//! > ⚡ 此时间戳由 deploy-stamp 自动更新
//! ```

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::LazyLock;

pub const SECTION_HEADING: &str = "## 🕒 最后更新时间";

const HEADING_DEPTH: usize = 2;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOCAL_LABEL: &str = "北京时间";
const LOCAL_OFFSET_SECS: i32 = 8 * 60 * 60;
const NOTE: &str = "> ⚡ 此时间戳由 deploy-stamp 自动更新";

static LOCAL_OFFSET: LazyLock<FixedOffset> = LazyLock::new(|| {
    FixedOffset::east_opt(LOCAL_OFFSET_SECS).expect("UTC+8 is within the valid offset range")
});

/// The two clock readings written into the section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub utc: String,
    pub local: String,
}

impl Stamp {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            utc: now.format(TIME_FORMAT).to_string(),
            local: now.with_timezone(&*LOCAL_OFFSET).format(TIME_FORMAT).to_string(),
        }
    }

    /// Renders the full section, ending with a newline.
    pub fn section(&self) -> String {
        format!(
            "{SECTION_HEADING}\n\n**UTC**: `{}`  \n**{LOCAL_LABEL}**: `{}`  \n\n{NOTE}\n",
            self.utc, self.local
        )
    }
}

/// Returns `content` with the timestamp section set to `now`, replacing an
/// existing section in place or appending a new one.
pub fn rewrite(content: &str, now: DateTime<Utc>) -> String {
    let section = Stamp::at(now).section();

    match find_section(content) {
        Some(span) => {
            let mut out = String::with_capacity(content.len() + section.len());
            out.push_str(&content[..span.start]);
            out.push_str(&section);
            if span.end < content.len() {
                out.push('\n');
            }
            out.push_str(&content[span.end..]);
            out
        }
        None => {
            let body = content.trim_end();
            if body.is_empty() {
                section
            } else {
                format!("{body}\n\n{section}")
            }
        }
    }
}

/// Byte range of the existing section: from the start of its heading line to
/// the start of the next heading line of depth <= 2, or the end of input.
fn find_section(content: &str) -> Option<std::ops::Range<usize>> {
    let mut start = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        match start {
            None if line.starts_with(SECTION_HEADING) => start = Some(offset),
            Some(begin) => {
                if heading_depth(line).is_some_and(|depth| depth <= HEADING_DEPTH) {
                    return Some(begin..offset);
                }
            }
            None => {}
        }
        offset += line.len();
    }

    start.map(|begin| begin..content.len())
}

/// Depth of an ATX heading line, `None` if the line is not a heading.
fn heading_depth(line: &str) -> Option<usize> {
    let line = line.trim_end_matches(['\n', '\r']);
    let depth = line.chars().take_while(|c| *c == '#').count();
    if depth == 0 || depth > 6 {
        return None;
    }
    match line[depth..].chars().next() {
        None | Some(' ') | Some('\t') => Some(depth),
        _ => None,
    }
}
