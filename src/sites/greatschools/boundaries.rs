use super::{captcha_conditions, parse_base, parsers};
use crate::downloader::{Document, Extracted, Extraction, Page, PageError, Site};
use crate::extract::Conditions;
use crate::query::{Query, Record};
use crate::ScrapeError;
use scraper::Html;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

const DATASET: &str = "shapes";

/// Attendance boundaries from the school JSON API
///
/// Queries carry the school's `GID` and its two-letter `state`.
pub struct BoundariesSite {
    base: Url,
    conditions: Arc<Conditions>,
}

impl BoundariesSite {
    pub fn new(base_url: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            base: parse_base(base_url)?,
            conditions: Arc::new(captcha_conditions()?),
        })
    }
}

impl Site for BoundariesSite {
    fn name(&self) -> &str {
        "boundaries"
    }

    fn url(&self, query: &Query) -> Result<Url, ScrapeError> {
        let gid = query.require("GID")?;
        let id = parsers::school_id(gid).ok_or_else(|| ScrapeError::QueryUrl {
            query: query.key(),
            reason: format!("no school id in '{}'", gid),
        })?;
        let state = query.require("state")?;

        let mut url = self.base.join(&format!("gsr/api/schools/{}/", id))?;
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("extras", "boundaries");
        Ok(url)
    }

    fn page(&self, query: &Query) -> Box<dyn Page> {
        Box::new(BoundariesPage {
            query: query.clone(),
            conditions: Arc::clone(&self.conditions),
            content: None,
            url: String::new(),
        })
    }
}

struct BoundariesPage {
    query: Query,
    conditions: Arc<Conditions>,
    content: Option<Value>,
    url: String,
}

impl BoundariesPage {
    fn boundaries(&self) -> Result<&serde_json::Map<String, Value>, PageError> {
        self.content
            .as_ref()
            .and_then(|content| content.get("boundaries"))
            .and_then(Value::as_object)
            .filter(|levels| !levels.is_empty())
            .ok_or_else(|| PageError::BadRequest {
                url: self.url.clone(),
            })
    }

    fn malformed(&self, level: &str) -> PageError {
        PageError::Fatal(ScrapeError::Extraction {
            url: self.url.clone(),
            message: format!("malformed '{}' boundary geometry", level),
        })
    }
}

impl Page for BoundariesPage {
    fn load(&mut self, document: Document) -> Result<(), PageError> {
        self.url = document.url.to_string();

        match serde_json::from_str::<Value>(&document.body) {
            Ok(content) => {
                self.content = Some(content);
                Ok(())
            }
            Err(e) => {
                // an HTML body here is an interstitial
                let html = Html::parse_document(&document.body);
                self.conditions.check(&html, &self.url)?;
                Err(ScrapeError::Extraction {
                    url: self.url.clone(),
                    message: format!("response is not JSON: {}", e),
                }
                .into())
            }
        }
    }

    fn setup(&mut self) -> Result<(), PageError> {
        self.boundaries().map(|_| ())
    }

    fn execute(&self) -> Result<Extraction<'_>, PageError> {
        let levels = self.boundaries()?;

        let rows = levels.iter().flat_map(move |(level, geometry)| {
            let polygons = match polygons(geometry) {
                Some(polygons) => polygons,
                None => return vec![Err(self.malformed(level))].into_iter(),
            };

            let mut rows = Vec::new();
            for (p, polygon) in polygons.iter().enumerate() {
                for (r, ring) in polygon.iter().enumerate() {
                    for (i, point) in ring.iter().enumerate() {
                        let Some((longitude, latitude)) = coordinate(point) else {
                            return vec![Err(self.malformed(level))].into_iter();
                        };

                        let record: Record = [
                            ("level", level.clone()),
                            ("polygon", p.to_string()),
                            ("ring", r.to_string()),
                            ("point", i.to_string()),
                            ("longitude", longitude.to_string()),
                            ("latitude", latitude.to_string()),
                        ]
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect();

                        rows.push(Ok(Extracted::new(self.query.clone(), DATASET, record)));
                    }
                }
            }
            rows.into_iter()
        });

        Ok(Box::new(rows))
    }
}

type Ring = Vec<Value>;

/// Polygons of a GeoJSON geometry as lists of rings
fn polygons(geometry: &Value) -> Option<Vec<Vec<Ring>>> {
    let coordinates = geometry.get("coordinates")?;

    let as_polygon = |polygon: &Value| -> Option<Vec<Ring>> {
        polygon
            .as_array()?
            .iter()
            .map(|ring| ring.as_array().cloned())
            .collect()
    };

    match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => Some(vec![as_polygon(coordinates)?]),
        _ => coordinates.as_array()?.iter().map(as_polygon).collect(),
    }
}

fn coordinate(point: &Value) -> Option<(f64, f64)> {
    let pair = point.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}
