//! Dotted version parsing and update comparison

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid version component '{component}' in '{version}'")]
    InvalidComponent { version: String, component: String },
}

/// Any number of dotted numeric components with an optional pre-release
/// marker such as `BETA`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    components: Vec<u32>,
    pub pre_release: Option<String>,
}

impl VersionTag {
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn major(&self) -> u32 {
        self.component(0)
    }

    pub fn minor(&self) -> u32 {
        self.component(1)
    }

    pub fn patch(&self) -> u32 {
        self.component(2)
    }

    /// Missing components read as 0
    fn component(&self, index: usize) -> u32 {
        self.components.get(index).copied().unwrap_or(0)
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// Left-to-right comparison, padding the shorter side with zeros
    fn cmp_numeric(&self, other: &VersionTag) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Whether `self` is a newer release than `current`.
    ///
    /// Numeric components decide first. On a tie, a stable release
    /// supersedes a pre-release; two pre-releases are never ordered.
    pub fn supersedes(&self, current: &VersionTag) -> bool {
        match self.cmp_numeric(current) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => current.is_pre_release() && !self.is_pre_release(),
        }
    }
}

impl FromStr for VersionTag {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let (numeric, mut pre_release) = match trimmed.split_once('-') {
            Some((numeric, suffix)) => (numeric, Some(suffix.to_string())),
            None => (trimmed, None),
        };

        let mut components = Vec::with_capacity(3);
        let mut segments = numeric.split('.');

        while let Some(segment) = segments.next() {
            match segment.parse::<u32>() {
                Ok(value) => components.push(value),
                // A trailing non-numeric segment ("3.1.0.BETA") is a pre-release marker
                Err(_) if !components.is_empty() && pre_release.is_none() && !segment.is_empty() => {
                    let rest: Vec<&str> = std::iter::once(segment).chain(segments.by_ref()).collect();
                    pre_release = Some(rest.join("."));
                }
                Err(_) => {
                    return Err(VersionError::InvalidComponent {
                        version: s.to_string(),
                        component: segment.to_string(),
                    });
                }
            }
        }

        Ok(VersionTag {
            components,
            pre_release: pre_release.filter(|tag| !tag.is_empty()),
        })
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.components.iter().map(u32::to_string).collect();
        f.write_str(&numbers.join("."))?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Whether `latest` is newer than `current`.
///
/// Malformed input never panics: the failure is logged and the answer is
/// `false`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    let parsed = latest
        .parse::<VersionTag>()
        .and_then(|l| current.parse::<VersionTag>().map(|c| (l, c)));

    match parsed {
        Ok((latest_tag, current_tag)) => latest_tag.supersedes(&current_tag),
        Err(e) => {
            warn!(latest, current, error = %e, "Version comparison failed");
            false
        }
    }
}
