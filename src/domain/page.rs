//! Page classification for incoming render requests.
//!
//! The host classifies each request once into a [`PageIdentity`]; everything
//! downstream (eligibility, key derivation, diagnostics) matches on it instead
//! of asking "is this a ..." questions repeatedly.

use std::fmt;

/// Who is asking for the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    Anonymous,
    Authenticated,
}

impl Requester {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Archive sub-kinds, each with its discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Category {
        term_id: u64,
    },
    Tag {
        term_id: u64,
    },
    Author {
        author_id: u64,
    },
    /// Month and day narrow the archive when present.
    Date {
        year: i32,
        month: Option<u8>,
        day: Option<u8>,
    },
    Taxonomy {
        taxonomy: String,
        term_id: u64,
    },
    PostType {
        post_type: String,
    },
    /// An archive the host could not narrow further.
    Other,
}

/// Closed classification of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// The site's front page, whether it shows posts or a static page.
    Front,
    /// The posts listing page when it is not also the front page.
    Blog,
    /// A single content item other than a static page.
    Single { item_id: u64 },
    Archive(ArchiveKind),
    /// A static page that is not the front page.
    StaticPage { page_id: u64 },
    /// Search results, 404s, feeds and anything else.
    Unclassified,
}

/// Page kind plus pagination offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageIdentity {
    pub kind: PageKind,
    /// 1-based listing page; 0 and 1 both mean "first page".
    pub paged: u32,
}

impl PageIdentity {
    pub fn new(kind: PageKind) -> Self {
        Self { kind, paged: 1 }
    }

    pub fn with_page(mut self, paged: u32) -> Self {
        self.paged = paged;
        self
    }

    pub fn front() -> Self {
        Self::new(PageKind::Front)
    }

    pub fn blog() -> Self {
        Self::new(PageKind::Blog)
    }

    pub fn single(item_id: u64) -> Self {
        Self::new(PageKind::Single { item_id })
    }

    pub fn static_page(page_id: u64) -> Self {
        Self::new(PageKind::StaticPage { page_id })
    }

    pub fn archive(kind: ArchiveKind) -> Self {
        Self::new(PageKind::Archive(kind))
    }

    pub fn unclassified() -> Self {
        Self::new(PageKind::Unclassified)
    }

    /// Page number when this is a later page of a listing.
    pub fn pagination(&self) -> Option<u32> {
        (self.paged > 1).then_some(self.paged)
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PageKind::Front => f.write_str("front page")?,
            PageKind::Blog => f.write_str("blog page")?,
            PageKind::Single { item_id } => write!(f, "single item {item_id}")?,
            PageKind::StaticPage { page_id } => write!(f, "page {page_id}")?,
            PageKind::Archive(archive) => match archive {
                ArchiveKind::Category { term_id } => write!(f, "category archive {term_id}")?,
                ArchiveKind::Tag { term_id } => write!(f, "tag archive {term_id}")?,
                ArchiveKind::Author { author_id } => write!(f, "author archive {author_id}")?,
                ArchiveKind::Date { year, month, day } => {
                    write!(f, "date archive {year}")?;
                    if let Some(month) = month {
                        write!(f, "-{month:02}")?;
                        if let Some(day) = day {
                            write!(f, "-{day:02}")?;
                        }
                    }
                }
                ArchiveKind::Taxonomy { taxonomy, term_id } => {
                    write!(f, "taxonomy archive {taxonomy}/{term_id}")?
                }
                ArchiveKind::PostType { post_type } => {
                    write!(f, "post type archive {post_type}")?
                }
                ArchiveKind::Other => f.write_str("archive")?,
            },
            PageKind::Unclassified => f.write_str("unclassified")?,
        }
        if let Some(paged) = self.pagination() {
            write!(f, " (page {paged})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_pagination() {
        assert_eq!(PageIdentity::blog().pagination(), None);
        assert_eq!(PageIdentity::blog().with_page(0).pagination(), None);
        assert_eq!(PageIdentity::blog().with_page(1).pagination(), None);
        assert_eq!(PageIdentity::blog().with_page(3).pagination(), Some(3));
    }

    #[test]
    fn display_describes_classification() {
        let date = PageIdentity::archive(ArchiveKind::Date {
            year: 2024,
            month: Some(3),
            day: Some(9),
        })
        .with_page(2);
        assert_eq!(date.to_string(), "date archive 2024-03-09 (page 2)");
        assert_eq!(PageIdentity::single(42).to_string(), "single item 42");
    }
}
