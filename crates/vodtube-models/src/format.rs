//! Title/description rendering and time formatting.
//!
//! Templates use literal `{name}` placeholders:
//! - `{title}`: raw video title
//! - `{channel}`: channel display name
//! - `{date}`: stream date (`YYYY-MM-DD` in titles, `Month D, YYYY` in descriptions)
//! - `{duration}`: human duration, descriptions only
//!
//! Unknown placeholders are left as-is. Substituted values are never
//! re-scanned, so a title containing `{channel}` stays literal.

use chrono::{DateTime, Utc};

use crate::video::{Chapter, VideoRecord};

const SHORT_DATE: &str = "%Y-%m-%d";
const LONG_DATE: &str = "%B %-d, %Y";

/// Values available to templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFields<'a> {
    pub title: &'a str,
    pub channel: &'a str,
    pub streamed_at: DateTime<Utc>,
    pub duration_secs: u64,
}

impl<'a> TemplateFields<'a> {
    pub fn from_video(video: &'a VideoRecord) -> Self {
        Self {
            title: &video.title,
            channel: &video.channel.display_name,
            streamed_at: video.streamed_at,
            duration_secs: video.duration_secs,
        }
    }

    fn short_date(&self) -> String {
        self.streamed_at.format(SHORT_DATE).to_string()
    }

    fn long_date(&self) -> String {
        self.streamed_at.format(LONG_DATE).to_string()
    }
}

/// Render a video title. An empty template yields the raw title.
pub fn render_title(template: &str, fields: &TemplateFields<'_>) -> String {
    if template.is_empty() {
        return fields.title.to_string();
    }
    substitute(template, |name| match name {
        "title" => Some(fields.title.to_string()),
        "channel" => Some(fields.channel.to_string()),
        "date" => Some(fields.short_date()),
        _ => None,
    })
}

/// Render a video description. An empty template yields
/// `Streamed by <channel> on <long-date>`.
pub fn render_description(template: &str, fields: &TemplateFields<'_>) -> String {
    if template.is_empty() {
        return format!("Streamed by {} on {}", fields.channel, fields.long_date());
    }
    substitute(template, |name| match name {
        "title" => Some(fields.title.to_string()),
        "channel" => Some(fields.channel.to_string()),
        "date" => Some(fields.long_date()),
        "duration" => Some(format_duration(fields.duration_secs)),
        _ => None,
    })
}

/// `1h 1m 1s` at or above an hour, `2m 5s` below.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}

/// `H:MM:SS` at or above an hour, `M:SS` below.
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Description block listing chapter timestamps, one line per chapter.
///
/// Returns an empty string when there are no chapters.
pub fn build_chapter_block(chapters: &[Chapter]) -> String {
    if chapters.is_empty() {
        return String::new();
    }
    let mut block = String::from("Chapters:\n");
    for chapter in chapters {
        block.push_str(&format_timestamp(chapter.start_secs));
        block.push_str(" - ");
        block.push_str(chapter.label());
        block.push('\n');
    }
    block
}

fn substitute<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields() -> TemplateFields<'static> {
        TemplateFields {
            title: "Stream #42",
            channel: "Shroud",
            streamed_at: Utc.with_ymd_and_hms(2024, 3, 5, 18, 30, 0).unwrap(),
            duration_secs: 3661,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3661), "1h 1m 1s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(0), "0m 0s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(3725), "1:02:05");
        assert_eq!(format_timestamp(65), "1:05");
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(600), "10:00");
        assert_eq!(format_timestamp(36000), "10:00:00");
    }

    #[test]
    fn test_empty_title_template_returns_raw_title() {
        assert_eq!(render_title("", &fields()), "Stream #42");
    }

    #[test]
    fn test_title_template_substitution() {
        let title = render_title("{channel} - {title} ({date})", &fields());
        assert_eq!(title, "Shroud - Stream #42 (2024-03-05)");
    }

    #[test]
    fn test_unknown_placeholders_stay_literal() {
        let title = render_title("{title} {game} {duration}", &fields());
        assert_eq!(title, "Stream #42 {game} {duration}");
    }

    #[test]
    fn test_unbalanced_braces_stay_literal() {
        assert_eq!(render_title("{title", &fields()), "{title");
        assert_eq!(render_title("{{title}", &fields()), "{Stream #42");
        assert_eq!(render_title("}{title}{", &fields()), "}Stream #42{");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let mut f = fields();
        f.title = "{channel}";
        assert_eq!(render_title("{title}", &f), "{channel}");
    }

    #[test]
    fn test_description_fallback() {
        assert_eq!(
            render_description("", &fields()),
            "Streamed by Shroud on March 5, 2024"
        );
    }

    #[test]
    fn test_description_template_substitution() {
        let desc = render_description("{title} by {channel} on {date}, {duration}", &fields());
        assert_eq!(desc, "Stream #42 by Shroud on March 5, 2024, 1h 1m 1s");
    }

    #[test]
    fn test_chapter_block() {
        let chapters = vec![
            Chapter::new(0, "Just Chatting"),
            Chapter::new(600, "Valorant").with_title("Ranked"),
            Chapter::new(3725, "Valorant"),
        ];
        assert_eq!(
            build_chapter_block(&chapters),
            "Chapters:\n0:00 - Just Chatting\n10:00 - Ranked\n1:02:05 - Valorant\n"
        );
    }

    #[test]
    fn test_chapter_block_empty() {
        assert_eq!(build_chapter_block(&[]), "");
    }
}
