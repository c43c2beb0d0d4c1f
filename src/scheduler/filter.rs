use std::collections::BTreeSet;

/// Location attributes of one reference row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub county: Option<String>,
}

/// Declarative selection over a reference table
///
/// A row matches when it satisfies any of the set options (or none are
/// given) and its state equals `state` (when given).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub state: Option<String>,
    pub citys: BTreeSet<String>,
    pub zipcodes: BTreeSet<String>,
    pub countys: BTreeSet<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.citys.insert(city.into());
        self
    }

    pub fn zipcode(mut self, zipcode: impl AsRef<str>) -> Self {
        let zipcode = zipcode.as_ref();
        self.zipcodes
            .insert(pad_zipcode(zipcode).unwrap_or_else(|| zipcode.to_string()));
        self
    }

    pub fn county(mut self, county: impl Into<String>) -> Self {
        self.countys.insert(county.into());
        self
    }

    fn has_sets(&self) -> bool {
        !(self.citys.is_empty() && self.zipcodes.is_empty() && self.countys.is_empty())
    }

    pub fn matches(&self, place: &Place) -> bool {
        let within = |set: &BTreeSet<String>, value: &Option<String>| {
            value.as_ref().is_some_and(|v| set.contains(v))
        };

        let selected = !self.has_sets()
            || within(&self.citys, &place.city)
            || within(&self.zipcodes, &place.zipcode)
            || within(&self.countys, &place.county);

        let in_state = match &self.state {
            Some(state) => place.state.as_deref() == Some(state.as_str()),
            None => true,
        };

        selected && in_state
    }
}

/// Zero-pads a numeric zipcode to five digits
pub fn pad_zipcode(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let digits = raw.strip_suffix(".0").unwrap_or(raw);
    let number: u32 = digits.parse().ok()?;
    (number <= 99_999).then(|| format!("{:05}", number))
}
