//! Cache key definitions.
//!
//! A key is a plain string derived from a [`PageIdentity`]: a type tag followed
//! by its discriminators, with the listing page appended past the first page.
//! The invalidation side builds the same strings from content metadata, so both
//! directions go through the constructors here.

use std::fmt;

use sha2::{Digest, Sha256};
use time::Date;

use crate::domain::page::{ArchiveKind, PageIdentity, PageKind};

const KEY_PREFIX: &str = "cache_";

/// Opaque identifier of one cached page variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a key string as-is.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    fn tagged(tag: impl fmt::Display) -> Self {
        Self(format!("{KEY_PREFIX}{tag}"))
    }

    /// Derive the key for a classified page; unclassified pages have none.
    pub fn for_page(identity: &PageIdentity) -> Option<Self> {
        let base = match &identity.kind {
            PageKind::Front => Self::home(),
            PageKind::Blog => Self::blog(),
            PageKind::Single { item_id } => Self::single(*item_id),
            PageKind::StaticPage { page_id } => Self::static_page(*page_id),
            PageKind::Archive(archive) => Self::archive(archive),
            PageKind::Unclassified => return None,
        };
        Some(match identity.pagination() {
            Some(paged) => base.paged(paged),
            None => base,
        })
    }

    pub fn home() -> Self {
        Self::tagged("home")
    }

    pub fn blog() -> Self {
        Self::tagged("blog")
    }

    pub fn single(item_id: u64) -> Self {
        Self::tagged(format_args!("post_{item_id}"))
    }

    pub fn static_page(page_id: u64) -> Self {
        Self::tagged(format_args!("page_{page_id}"))
    }

    pub fn archive(archive: &ArchiveKind) -> Self {
        match archive {
            ArchiveKind::Category { term_id } => Self::tagged(format_args!("category_{term_id}")),
            ArchiveKind::Tag { term_id } => Self::tagged(format_args!("tag_{term_id}")),
            ArchiveKind::Author { author_id } => Self::tagged(format_args!("author_{author_id}")),
            ArchiveKind::Date { year, month, day } => {
                let mut tag = format!("date_{year}");
                if let Some(month) = month {
                    tag.push_str(&format!("_{month:02}"));
                    if let Some(day) = day {
                        tag.push_str(&format!("_{day:02}"));
                    }
                }
                Self::tagged(tag)
            }
            ArchiveKind::Taxonomy { taxonomy, term_id } => {
                Self::tagged(format_args!("tax_{taxonomy}_{term_id}"))
            }
            ArchiveKind::PostType { post_type } => {
                Self::tagged(format_args!("archive_{post_type}"))
            }
            ArchiveKind::Other => Self::tagged("archive"),
        }
    }

    /// Year, year-month and year-month-day archive keys for a publish date.
    pub fn date_archives(date: Date) -> [Self; 3] {
        let year = date.year();
        let month = Some(u8::from(date.month()));
        let day = Some(date.day());
        [
            Self::archive(&ArchiveKind::Date {
                year,
                month: None,
                day: None,
            }),
            Self::archive(&ArchiveKind::Date {
                year,
                month,
                day: None,
            }),
            Self::archive(&ArchiveKind::Date { year, month, day }),
        ]
    }

    /// The key of a later page of the same listing.
    pub fn paged(&self, paged: u32) -> Self {
        Self(format!("{}_page_{paged}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe digest of the key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
