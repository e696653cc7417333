//! Fileset include/exclude matching for the script module's query surface.
//!
//! Pure and independent of the store: double-star globs (`globset`, the
//! same crate the wider corpus reaches for path-glob matching), exclude
//! dominates include, no include patterns means "match everything".

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct FilesetSpec {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub struct Fileset {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl Fileset {
    pub fn compile(spec: &FilesetSpec) -> Result<Self> {
        Ok(Self {
            include: build_set(&spec.include)?,
            exclude: build_set(&spec.exclude)?,
        })
    }

    /// `exclude` wins over `include` (§5). A `path` with no `include` set
    /// configured matches unless it's excluded.
    pub fn matches(&self, path: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path) {
                return false;
            }
        }
        match &self.include {
            Some(include) => include.is_match(path),
            None => true,
        }
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    Ok(Some(builder.build().map_err(|source| Error::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_matches_everything() {
        let fs = Fileset::compile(&FilesetSpec::default()).unwrap();
        assert!(fs.matches("src/lib.rs"));
        assert!(fs.matches("anything/at/all.rs"));
    }

    #[test]
    fn include_restricts_to_matching_paths() {
        let fs = Fileset::compile(&FilesetSpec {
            include: vec!["src/**/*.rs".into()],
            exclude: vec![],
        })
        .unwrap();
        assert!(fs.matches("src/passes/diff.rs"));
        assert!(!fs.matches("docs/readme.md"));
    }

    #[test]
    fn exclude_dominates_include() {
        let fs = Fileset::compile(&FilesetSpec {
            include: vec!["**/*.rs".into()],
            exclude: vec!["**/generated/**".into()],
        })
        .unwrap();
        assert!(fs.matches("src/lib.rs"));
        assert!(!fs.matches("src/generated/schema.rs"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let result = Fileset::compile(&FilesetSpec {
            include: vec!["[".into()],
            exclude: vec![],
        });
        assert!(result.is_err());
    }
}
