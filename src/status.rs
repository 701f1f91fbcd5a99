//! Membership status labels and the legacy point-of-sale status codes behind them.

/// Label to code, in the order the audience builder lists them.
static STATUS_CODES: &[(&str, i32)] = &[
    ("Plan Used", 0),
    ("Joined", 1),
    ("Transfer In", 2),
    ("Renewed", 3),
    ("Resumed", 6),
    ("Discontinuing", 7),
    ("Plan Expired", 21),
    ("Discontinued", 27),
    ("Terminated", 29),
    ("Transfer Out", 30),
    ("Suspended", 40),
    ("Card Expired", 110),
    ("Card Declined", 120),
    ("Recharge Problem", 130),
    ("Enter/Swipe New Credit Card", 140),
    ("New Card is Approved", 150),
    ("Credit Card Changed", 200),
    ("Join Date Changed", 201),
];

/// Statuses that end a membership.
pub const CANCELLED_LABELS: [&str; 2] = ["Discontinued", "Terminated"];

pub fn translate(label: &str) -> Option<i32> {
    STATUS_CODES
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, code)| *code)
}

/// Translates every label, silently skipping the ones without a code.
pub fn translate_all<'a, I>(labels: I) -> Vec<i32>
where
    I: IntoIterator<Item = &'a str>,
{
    labels.into_iter().filter_map(translate).collect()
}

pub fn labels() -> impl Iterator<Item = &'static str> {
    STATUS_CODES.iter().map(|(label, _)| *label)
}
