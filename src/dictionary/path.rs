//! This module contains the logical paths used to address nodes, both in the
//! dictionary and in the typed view over it.

use std::{
    convert::Infallible,
    fmt::{Display, Formatter},
    str::FromStr,
};

use itertools::Itertools;

use crate::{
    constant::PATH_SEPARATOR,
    error::path::{Error, Result},
};

/// An ordered list of segments, addressing a node from the root.
///
/// The textual form joins the segments with [`PATH_SEPARATOR`], and hence no
/// segment may contain the separator itself.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Constructs the empty path, which addresses the root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Constructs a path from `segments`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any segment contains the path separator.
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Result<Self> {
        let segments = segments.into_iter().map(Into::into).collect::<Vec<String>>();
        if let Some(segment) = segments.iter().find(|s| s.contains(PATH_SEPARATOR)) {
            return Err(Error::SeparatorInSegment {
                segment: segment.clone(),
            });
        }

        Ok(Self { segments })
    }

    /// Parses a path from its textual form, where the empty string is the
    /// root.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            text.split(PATH_SEPARATOR).map(ToString::to_string).collect()
        };

        Self { segments }
    }

    /// Constructs a new path with `segment` appended to this one.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `segment` contains the path separator.
    pub fn extend(&self, segment: impl Into<String>) -> Result<Self> {
        let segment = segment.into();
        if segment.contains(PATH_SEPARATOR) {
            return Err(Error::SeparatorInSegment { segment });
        }
        let mut segments = self.segments.clone();
        segments.push(segment);

        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Gets the first segment and the path that follows it.
    #[must_use]
    pub fn split_first(&self) -> Option<(&str, &[String])> {
        self.segments.split_first().map(|(first, rest)| (first.as_str(), rest))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.iter().join(&PATH_SEPARATOR.to_string()))
    }
}

/// Every string is a valid path, as splitting on the separator never leaves it
/// inside a segment.
impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<'a> IntoIterator for &'a Path {
    type IntoIter = std::slice::Iter<'a, String>;
    type Item = &'a String;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Parses `segment` as a numeric index.
///
/// # Errors
///
/// Returns [`Err`] if the segment is not a non-negative integer.
pub fn parse_index(segment: &str) -> Result<u64> {
    segment.parse().map_err(|_| Error::InvalidIndex {
        segment: segment.to_string(),
    })
}

#[cfg(test)]
mod test {
    use crate::{dictionary::path::Path, error::path::Error};

    #[test]
    fn round_trips_through_text() -> anyhow::Result<()> {
        let path = Path::new(["1", "abc", "0"])?;
        assert_eq!(path.to_string(), "1|abc|0");
        assert_eq!(Path::parse("1|abc|0"), path);
        assert_eq!("1|abc|0".parse::<Path>(), Ok(path));
        assert!(Path::parse("").is_empty());

        Ok(())
    }

    #[test]
    fn rejects_segments_containing_the_separator() {
        assert_eq!(
            Path::new(["a|b"]),
            Err(Error::SeparatorInSegment {
                segment: "a|b".into(),
            })
        );
        assert!(Path::root().extend("x|y").is_err());
    }
}
