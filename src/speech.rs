/// Formats a signed seconds-until-start value into the English phrase used
/// across the Alexa handlers.
pub fn duration_spoken(seconds_until_start: i64) -> String {
    if seconds_until_start < 0 {
        return "in the past".to_string();
    }
    if seconds_until_start < 60 {
        return pluralize(seconds_until_start, "second");
    }
    if seconds_until_start < 3600 {
        let minutes = seconds_until_start / 60;
        return pluralize(minutes, "minute");
    }
    let hours = seconds_until_start / 3600;
    let minutes = (seconds_until_start % 3600) / 60;
    if minutes == 0 {
        format!("in {}", pluralize_noun(hours, "hour"))
    } else {
        format!(
            "in {} and {}",
            pluralize_noun(hours, "hour"),
            pluralize_noun(minutes, "minute")
        )
    }
}

fn pluralize(n: i64, noun: &str) -> String {
    format!("in {}", pluralize_noun(n, noun))
}

fn pluralize_noun(n: i64, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Formats a local time for speech: 12-hour, lower-cased, e.g. "5:30 pm".
pub fn spoken_local_time(local: chrono::NaiveTime) -> String {
    local.format("%l:%M %P").to_string().trim_start().to_string()
}

pub fn next_meeting_speech(subject: &str, seconds_until_start: i64) -> String {
    format!(
        "Your next meeting is {subject} {}.",
        duration_spoken(seconds_until_start)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_a_minute() {
        assert_eq!(duration_spoken(45), "in 45 seconds");
        assert_eq!(duration_spoken(1), "in 1 second");
    }

    #[test]
    fn under_an_hour() {
        assert_eq!(duration_spoken(900), "in 15 minutes");
        assert_eq!(duration_spoken(60), "in 1 minute");
    }

    #[test]
    fn hours_and_minutes() {
        assert_eq!(duration_spoken(3600), "in 1 hour");
        assert_eq!(duration_spoken(3900), "in 1 hour and 5 minutes");
        assert_eq!(duration_spoken(7200), "in 2 hours");
    }

    #[test]
    fn negative_is_in_the_past() {
        assert_eq!(duration_spoken(-30), "in the past");
    }

    #[test]
    fn next_meeting_speech_format() {
        assert_eq!(
            next_meeting_speech("Team Sync", 900),
            "Your next meeting is Team Sync in 15 minutes."
        );
    }

    #[test]
    fn spoken_local_time_lowercases_meridiem() {
        let t = chrono::NaiveTime::from_hms_opt(17, 30, 0).unwrap();
        assert_eq!(spoken_local_time(t), "5:30 pm");
    }
}
