use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ADDRESS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<street>.+?),\s*(?P<city>[^,]+?),\s*(?P<state>[A-Z]{2})\s+(?P<zipcode>\d{5})(?:-\d{4})?\s*$",
    )
    .expect("hardcoded regex pattern is valid")
});

/// A US postal address as shown on listing and detail pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl Address {
    /// Parses `"street, city, ST 12345"`; a ZIP+4 suffix is dropped
    pub fn parse(text: &str) -> Option<Self> {
        let captures = ADDRESS_REGEX.captures(text.trim())?;
        let part = |name: &str| captures.name(name).map(|m| m.as_str().trim().to_string());

        Some(Self {
            street: part("street")?,
            city: part("city")?,
            state: part("state")?,
            zipcode: part("zipcode")?,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {} {}",
            self.street, self.city, self.state, self.zipcode
        )
    }
}
