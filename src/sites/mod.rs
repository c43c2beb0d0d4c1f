//! Site stages
//!
//! Each stage pairs a reference table (what to schedule) with a site (how to
//! build URLs and read pages).

pub mod greatschools;

use crate::config::Config;
use crate::downloader::Site;
use crate::scheduler::Source;
use crate::ScrapeError;
use std::fmt;
use std::path::PathBuf;

/// The three scraping stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Stage {
    /// Search listings by zipcode, producing the `links` dataset
    Links,
    /// School detail pages by GID
    Schools,
    /// Attendance boundaries by GID
    Boundaries,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Schools => "schools",
            Self::Boundaries => "boundaries",
        }
    }

    /// Reference table the stage is scheduled from
    pub fn source(&self, config: &Config) -> Source {
        match self {
            Self::Links => Source::Zipcodes(PathBuf::from(&config.input.zipcodes)),
            Self::Schools => Source::Links(PathBuf::from(&config.input.links)),
            Self::Boundaries => Source::Boundaries(PathBuf::from(&config.input.links)),
        }
    }

    /// Builds the site for this stage
    pub fn site(&self, config: &Config) -> Result<Box<dyn Site>, ScrapeError> {
        let base = &config.scraper.base_url;
        Ok(match self {
            Self::Links => Box::new(greatschools::LinksSite::new(base)?),
            Self::Schools => Box::new(greatschools::SchoolsSite::new(
                base,
                config.scraper.follow_nearby,
            )?),
            Self::Boundaries => Box::new(greatschools::BoundariesSite::new(base)?),
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
