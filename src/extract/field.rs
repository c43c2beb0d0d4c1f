use crate::extract::{normalize_text, selector};
use crate::query::Record;
use crate::ScrapeError;
use scraper::{ElementRef, Selector};

/// Turns raw element content into a stored value; None drops the field
pub type ValueParser = fn(&str) -> Option<String>;

/// What to read from a matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    /// Whitespace-normalized text content
    Text,
    /// Value of the named attribute
    Attr(&'static str),
}

/// A named value located by a CSS selector
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    selector: Selector,
    read: Read,
    parser: Option<ValueParser>,
}

impl Field {
    pub fn text(name: &'static str, css: &str) -> Result<Self, ScrapeError> {
        Self::new(name, css, Read::Text)
    }

    pub fn attr(name: &'static str, css: &str, attr: &'static str) -> Result<Self, ScrapeError> {
        Self::new(name, css, Read::Attr(attr))
    }

    pub fn new(name: &'static str, css: &str, read: Read) -> Result<Self, ScrapeError> {
        Ok(Self {
            name,
            selector: selector(css)?,
            read,
            parser: None,
        })
    }

    /// Runs every read value through `parser`
    pub fn parsed(mut self, parser: ValueParser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// First parsable value under `scope`
    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        scope
            .select(&self.selector)
            .find_map(|element| self.read_element(element))
    }

    /// Every value under `scope`, unparsable ones skipped
    pub fn all(&self, scope: ElementRef<'_>) -> Vec<String> {
        scope
            .select(&self.selector)
            .filter_map(|element| self.read_element(element))
            .collect()
    }

    /// Raw values for every match, keeping positions of unparsable ones
    pub fn each(&self, scope: ElementRef<'_>) -> Vec<Option<String>> {
        scope
            .select(&self.selector)
            .map(|element| self.read_element(element))
            .collect()
    }

    /// Whether the selector matches anything under `scope`
    pub fn present(&self, scope: ElementRef<'_>) -> bool {
        scope.select(&self.selector).next().is_some()
    }

    fn read_element(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match self.read {
            Read::Text => normalize_text(element.text()),
            Read::Attr(attr) => element.value().attr(attr)?.trim().to_string(),
        };

        if raw.is_empty() {
            return None;
        }

        match self.parser {
            Some(parser) => parser(&raw),
            None => Some(raw),
        }
    }
}

/// Ordered registry of fields forming one record
#[derive(Debug, Clone, Default)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Reads the first value of every field present under `scope`
    pub fn record(&self, scope: ElementRef<'_>) -> Record {
        self.fields
            .iter()
            .filter_map(|field| field.first(scope).map(|v| (field.name.to_string(), v)))
            .collect()
    }
}
