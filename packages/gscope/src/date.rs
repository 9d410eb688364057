use std::sync::LazyLock;

use chrono::{Datelike as _, Offset as _, TimeZone as _};
use chrono_tz::Tz;
use regex::Regex;
use scraper::ElementRef;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second]");
const TIME_FORMAT_SHORT: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]");

// Displayed dates carry no year, the resolver prepends its reference year.
const TEXT_FORMATS: [&[BorrowedFormatItem<'_>]; 2] = [
    format_description!(
        "[year] [month repr:short] [day] at [hour repr:12 padding:none]:[minute][period case:upper case_sensitive:false]"
    ),
    format_description!(
        "[year] [month repr:short] [day] at  [hour repr:12 padding:none]:[minute][period case:upper case_sensitive:false]"
    ),
];

static DATETIME_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2})(?:[T ](?P<time>\d{2}:\d{2}(?::\d{2})?))?(?:\s*|T)(?P<offset>Z|[-+]\d{2}:?\d{2})$",
    )
    .unwrap()
});

/// Parses the dates shown in assignment tables.
///
/// A `datetime` attribute is preferred. Without one, the element text is read as
/// `Sep 06 at 11:59PM` in the site's home zone.
#[derive(Debug, Clone)]
pub struct DateResolver {
    zone: Tz,
    year: i32,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DateResolver {
    pub const ZONE: Tz = chrono_tz::America::New_York;
    pub const LATE_DUE_PREFIX: &'static str = "Late Due Date: ";

    /// Resolver assuming the current year for dates displayed without one.
    pub fn new() -> Self {
        let year = chrono::Utc::now().with_timezone(&Self::ZONE).year();
        Self::with_year(year)
    }

    pub fn with_year(year: i32) -> Self {
        Self {
            zone: Self::ZONE,
            year,
        }
    }

    /// Returns `None` when neither the `datetime` attribute nor the text parse.
    pub fn parse(&self, element: ElementRef) -> Option<OffsetDateTime> {
        let parsed = element
            .attr("datetime")
            .and_then(parse_datetime_attr)
            .or_else(|| {
                let text = element.text().collect::<String>();
                self.parse_text(text.trim())
            });
        if parsed.is_none() {
            tracing::warn!("Failed to parse date from element: {}", element.html());
        }
        parsed
    }

    /// Parses displayed text such as `Late Due Date: Sep 13 at 11:59PM`.
    pub fn parse_text(&self, text: &str) -> Option<OffsetDateTime> {
        let text = text.strip_prefix(Self::LATE_DUE_PREFIX).unwrap_or(text);
        if text.is_empty() {
            return None;
        }
        let input = format!("{} {text}", self.year);
        let local = TEXT_FORMATS
            .iter()
            .find_map(|format| PrimitiveDateTime::parse(&input, format).ok())?;
        self.assume_zone(local)
    }

    fn assume_zone(&self, local: PrimitiveDateTime) -> Option<OffsetDateTime> {
        let naive = chrono::NaiveDate::from_ymd_opt(
            local.year(),
            u8::from(local.month()) as u32,
            local.day() as u32,
        )?
        .and_hms_opt(
            local.hour() as u32,
            local.minute() as u32,
            local.second() as u32,
        )?;
        let zoned = self
            .zone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| self.zone.from_local_datetime(&naive).latest())?;
        let offset = UtcOffset::from_whole_seconds(zoned.offset().fix().local_minus_utc()).ok()?;
        Some(local.assume_offset(offset))
    }
}

/// Parses a `datetime` attribute such as `2024-09-06 23:59:00 -0400`.
///
/// The whitespace before the offset is treated as the ISO `T` separator, so a bare
/// date with an offset (`2024-09-06 -0400`) resolves to midnight at that offset.
pub fn parse_datetime_attr(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    let captures = DATETIME_ATTR.captures(raw)?;
    let date = Date::parse(&captures["date"], DATE_FORMAT).ok()?;
    let time = match captures.name("time") {
        Some(time) => Time::parse(time.as_str(), TIME_FORMAT)
            .or_else(|_| Time::parse(time.as_str(), TIME_FORMAT_SHORT))
            .ok()?,
        None => Time::MIDNIGHT,
    };
    let offset = parse_offset(&captures["offset"])?;
    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

fn parse_offset(raw: &str) -> Option<UtcOffset> {
    if raw == "Z" {
        return Some(UtcOffset::UTC);
    }
    let (sign, digits) = raw.split_at(1);
    let digits = digits.replace(':', "");
    let hours = digits.get(..2)?.parse::<i8>().ok()?;
    let minutes = digits.get(2..4)?.parse::<i8>().ok()?;
    let sign = if sign == "-" { -1 } else { 1 };
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};
    use time::macros::{datetime, offset};
    use tracing_test::traced_test;

    use super::*;

    fn parse_first_time(html: &str) -> Option<OffsetDateTime> {
        let fragment = Html::parse_fragment(html);
        let selector = Selector::parse("time").unwrap();
        let element = fragment.select(&selector).next().unwrap();
        DateResolver::with_year(2024).parse(element)
    }

    #[test]
    fn attribute_with_date_and_offset() {
        let parsed = parse_first_time(r#"<time datetime="2024-09-06 -0400">Sep 06</time>"#);
        assert_eq!(parsed, Some(datetime!(2024-09-06 0:00 -4)));
        assert_eq!(parsed.unwrap().offset(), offset!(-04:00));
    }

    #[test]
    fn attribute_with_time_and_offset() {
        assert_eq!(
            parse_datetime_attr("2024-09-06 23:59:00 -0400"),
            Some(datetime!(2024-09-06 23:59 -4))
        );
        assert_eq!(
            parse_datetime_attr("2024-09-06T23:59-04:00"),
            Some(datetime!(2024-09-06 23:59 -4))
        );
        assert_eq!(
            parse_datetime_attr("2024-09-06T23:59:00Z"),
            Some(datetime!(2024-09-06 23:59 UTC))
        );
        assert_eq!(parse_datetime_attr("next friday"), None);
    }

    #[test]
    fn text_in_new_york_time() {
        let parsed = parse_first_time("<time>Sep 06 at 11:59PM</time>");
        assert_eq!(parsed, Some(datetime!(2024-09-06 23:59 -4)));

        let winter = parse_first_time("<time>  Dec 13 at  9:00AM </time>");
        assert_eq!(winter, Some(datetime!(2024-12-13 9:00 -5)));
    }

    #[test]
    fn text_with_late_due_prefix() {
        let parsed = parse_first_time("<time>Late Due Date: Sep 13 at 11:59PM</time>");
        assert_eq!(parsed, Some(datetime!(2024-09-13 23:59 -4)));
    }

    #[test]
    fn invalid_attribute_falls_back_to_text() {
        let parsed =
            parse_first_time(r#"<time datetime="soon">Oct 01 at 5:00PM</time>"#);
        assert_eq!(parsed, Some(datetime!(2024-10-01 17:00 -4)));
    }

    #[traced_test]
    #[test]
    fn unparseable_text_is_none() {
        assert_eq!(parse_first_time("<time>whenever</time>"), None);
        assert!(logs_contain("Failed to parse date"));
        assert_eq!(parse_first_time("<time></time>"), None);
        assert_eq!(DateResolver::with_year(2024).parse_text("Late Due Date: "), None);
    }
}
