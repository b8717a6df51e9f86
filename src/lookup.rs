//! Movie lookup: turns a queued subject into a result record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Details delivered to clients for one queued lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
  /// Subject text exactly as it was queued
  pub subject: String,
  pub title: String,
  pub year: i32,
  pub director: String,
  pub plot: String,
  pub thumbnail_url: String,
}

/// Lookup capability.
#[async_trait]
pub trait Resolver: Send + Sync {
  async fn resolve(&self, subject: &str) -> Result<ResultRecord>;
}

/// A movie the catalog knows about.
#[derive(Debug, PartialEq, Eq)]
pub struct CannedMovie {
  /// Normalized lookup key
  pub key: &'static str,
  pub title: &'static str,
  pub year: i32,
  pub director: &'static str,
  pub plot: &'static str,
  pub thumbnail_url: &'static str,
}

const CANNED_MOVIES: &[CannedMovie] = &[
  CannedMovie {
    key: "inception",
    title: "Inception",
    year: 2010,
    director: "Christopher Nolan",
    plot: "A thief who steals corporate secrets through dream-sharing technology is given the inverse task of planting an idea.",
    thumbnail_url: "https://m.media-amazon.com/images/I/51v5ZpFyaFL._AC_SY679_.jpg",
  },
  CannedMovie {
    key: "interstellar",
    title: "Interstellar",
    year: 2014,
    director: "Christopher Nolan",
    plot: "A team of explorers travel through a wormhole in space in an attempt to ensure humanity\u{2019}s survival.",
    thumbnail_url: "https://m.media-amazon.com/images/I/91kFYg4fX3L._AC_SY679_.jpg",
  },
  CannedMovie {
    key: "matrix",
    title: "The Matrix",
    year: 1999,
    director: "The Wachowskis",
    plot: "A computer hacker learns about the true nature of his reality and his role in the war against its controllers.",
    thumbnail_url: "https://m.media-amazon.com/images/I/51EG732BV3L.jpg",
  },
];

const UNKNOWN_YEAR: i32 = 2025;
const UNKNOWN_DIRECTOR: &str = "Unknown";
const UNKNOWN_PLOT: &str = "No details found. This is a made-up movie.";
const UNKNOWN_THUMBNAIL: &str = "https://cdn-icons-png.flaticon.com/512/744/744922.png";

/// A subject classified against the catalog.
#[derive(Debug, PartialEq, Eq)]
pub enum Subject<'a> {
  Known(&'static CannedMovie),
  Unknown(&'a str),
}

impl<'a> Subject<'a> {
  pub fn classify(raw: &'a str) -> Self {
    let key = normalize_subject(raw);
    match CANNED_MOVIES.iter().find(|movie| movie.key == key) {
      Some(movie) => Subject::Known(movie),
      None => Subject::Unknown(raw),
    }
  }
}

/// Normalize a subject for matching.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_subject(subject: &str) -> String {
  subject.trim().to_lowercase()
}

/// Deterministic stand-in for the movie metadata service.
///
/// Every subject resolves: unrecognized titles get a synthesized record
/// that echoes the subject as its title.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovieCatalog;

impl MovieCatalog {
  pub fn lookup(subject: &str) -> ResultRecord {
    match Subject::classify(subject) {
      Subject::Known(movie) => ResultRecord {
        subject: subject.to_string(),
        title: movie.title.to_string(),
        year: movie.year,
        director: movie.director.to_string(),
        plot: movie.plot.to_string(),
        thumbnail_url: movie.thumbnail_url.to_string(),
      },
      Subject::Unknown(raw) => ResultRecord {
        subject: subject.to_string(),
        title: raw.to_string(),
        year: UNKNOWN_YEAR,
        director: UNKNOWN_DIRECTOR.to_string(),
        plot: UNKNOWN_PLOT.to_string(),
        thumbnail_url: UNKNOWN_THUMBNAIL.to_string(),
      },
    }
  }
}

#[async_trait]
impl Resolver for MovieCatalog {
  async fn resolve(&self, subject: &str) -> Result<ResultRecord> {
    Ok(Self::lookup(subject))
  }
}
