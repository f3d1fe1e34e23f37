use std::num::ParseIntError;

/// Compiles a CSS selector once and hands out a `&'static Selector`.
macro_rules! selector {
    ($e: expr) => {{
        use ::once_cell::sync::Lazy;
        use ::scraper::Selector;
        static SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse($e).unwrap());
        &*SELECTOR
    }};
}

pub(crate) use selector;

/// Parses a player count such as `1,234,567`, ignoring thousands separators
/// and any whitespace (including non-breaking spaces).
pub fn parse_count(text: &str) -> Result<u64, ParseIntError> {
    let digits: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    digits.parse()
}
