use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumCopyPatternMode, GraphCopyError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeCopyPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SpecFieldPatterns {
    pub(crate) patterns_exclude_fields: Option<TypeCopyPatternSeq>,
}

impl SpecFieldPatterns {
    pub(crate) fn from_raw(
        patterns_exclude_fields: Option<&[String]>,
        rule_pattern: EnumCopyPatternMode,
    ) -> Result<Self, GraphCopyError> {
        Ok(Self {
            patterns_exclude_fields: _compile(patterns_exclude_fields, rule_pattern)?,
        })
    }

    pub(crate) fn should_exclude_field(&self, field_name: &str) -> bool {
        _is_pattern_matching(field_name, self.patterns_exclude_fields.as_ref())
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumCopyPatternMode,
) -> Result<Option<TypeCopyPatternSeq>, GraphCopyError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumCopyPatternMode::Literal => Ok(Some(TypeCopyPatternSeq::Literal(patterns.to_vec()))),
        EnumCopyPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        GraphCopyError::InvalidPattern(format!(
                            "Invalid pattern in exclude fields: {e}"
                        ))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeCopyPatternSeq::Glob(l_glob)))
        }
        EnumCopyPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    GraphCopyError::InvalidPattern(format!(
                        "Invalid pattern in exclude fields: {e}"
                    ))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeCopyPatternSeq::Regex(l_regex)))
        }
    }
}

fn _is_pattern_matching(value: &str, patterns: Option<&TypeCopyPatternSeq>) -> bool {
    match patterns {
        None => false,
        Some(TypeCopyPatternSeq::Literal(v)) => v.iter().any(|p| p == value),
        Some(TypeCopyPatternSeq::Glob(v)) => v.iter().any(|p| p.is_match(value)),
        Some(TypeCopyPatternSeq::Regex(v)) => v.iter().any(|p| p.is_match(value)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Limits

pub(crate) fn validate_depth_limit(depth_limit: Option<usize>) -> Result<(), GraphCopyError> {
    if depth_limit == Some(0) {
        return Err(GraphCopyError::InvalidDepthLimit(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn is_depth_within_limit(depth_value: usize, depth_limit: Option<usize>) -> bool {
    depth_limit.is_none_or(|limit| depth_value <= limit)
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
