//! Finds the other user mentioned in a transaction description.

use std::sync::OnceLock;

use regex::Regex;

/// Matches `@` or `to ` followed by either an email address or a bare name.
///
/// The email alternative comes first so it wins when both could match at the same position.
const MENTION_PATTERN: &str =
    r"(?i)(?:@|to\s)([A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+\.[A-Za-z0-9_]+|[A-Za-z0-9_.-]+)";

/// A whole string made of the characters a bare-name mention can contain.
const NAME_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

fn mention_regex() -> &'static Regex {
    static MENTION_REGEX: OnceLock<Regex> = OnceLock::new();

    MENTION_REGEX.get_or_init(|| Regex::new(MENTION_PATTERN).expect("mention pattern is valid"))
}

fn name_regex() -> &'static Regex {
    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

    NAME_REGEX.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is valid"))
}

/// Whether [parse_mention] returns all of `name` when it follows a mention trigger.
///
/// Display names must pass this check, otherwise "to Alice Smith" would be read as a mention
/// of "Alice".
pub(crate) fn is_mentionable_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Get the email address or name that `description` mentions, if any.
///
/// A mention is `@` or `to ` (case-insensitive, any whitespace) followed by the token. Only the
/// first mention counts and the token is returned exactly as written. Returns `None` for
/// transactions that do not involve another user.
///
/// ```
/// use tabby_rs::parse_mention;
///
/// assert_eq!(parse_mention("Dinner @sam@example.com"), Some("sam@example.com"));
/// assert_eq!(parse_mention("Taxi TO Alice"), Some("Alice"));
/// assert_eq!(parse_mention("Groceries"), None);
/// ```
pub fn parse_mention(description: &str) -> Option<&str> {
    mention_regex()
        .captures(description)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str())
}

#[cfg(test)]
mod tests {
    use super::{is_mentionable_name, parse_mention};

    #[test]
    fn mentionable_names() {
        assert!(is_mentionable_name("alice"));
        assert!(is_mentionable_name("bob.smith-2_x"));
        assert!(!is_mentionable_name("Alice Smith"));
        assert!(!is_mentionable_name("Zoë"));
        assert!(!is_mentionable_name("bob@home"));
        assert!(!is_mentionable_name(""));
    }

    #[test]
    fn mentionable_name_round_trips_through_parser() {
        for name in ["alice", "bob.smith", "x_y-z"] {
            assert_eq!(parse_mention(&format!("Lunch to {name}")), Some(name));
        }
    }

    #[test]
    fn finds_email_after_at_sign() {
        assert_eq!(
            parse_mention("Concert tickets @user@example.com"),
            Some("user@example.com")
        );
    }

    #[test]
    fn finds_name_after_to() {
        assert_eq!(parse_mention("Paid back to Alice"), Some("Alice"));
    }

    #[test]
    fn finds_name_after_at_sign() {
        assert_eq!(parse_mention("Pizza with @bob.smith"), Some("bob.smith"));
    }

    #[test]
    fn finds_email_after_to() {
        assert_eq!(
            parse_mention("Sent to carol-c@mail.example.org today"),
            Some("carol-c@mail.example.org")
        );
    }

    #[test]
    fn trigger_is_case_insensitive_and_token_keeps_case() {
        assert_eq!(parse_mention("Rent To BoB"), Some("BoB"));
        assert_eq!(parse_mention("Rent tO\tDave"), Some("Dave"));
    }

    #[test]
    fn first_mention_wins() {
        assert_eq!(parse_mention("Lunch @erin then to frank"), Some("erin"));
        assert_eq!(parse_mention("Lunch to frank then @erin"), Some("frank"));
    }

    #[test]
    fn to_needs_following_whitespace() {
        assert_eq!(parse_mention("Tomatoes and potatoes"), None);
    }

    #[test]
    fn to_inside_a_word_still_triggers() {
        assert_eq!(parse_mention("potato salad"), Some("salad"));
    }

    #[test]
    fn no_trigger_is_no_mention() {
        assert_eq!(parse_mention("Weekly groceries"), None);
        assert_eq!(parse_mention(""), None);
    }

    #[test]
    fn trailing_trigger_is_no_mention() {
        assert_eq!(parse_mention("Who is this for @"), None);
    }

    #[test]
    fn unicode_names_are_not_matched() {
        assert_eq!(parse_mention("Coffee @élodie"), None);
    }
}
