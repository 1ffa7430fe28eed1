//! Predicates used by the batch operations.
//!
//! Any `FnMut(&T) -> Result<bool>` is a filter. Filters may call out to
//! version control, so batch operations always evaluate them sequentially.

use crate::error::Result;
use crate::modified_branch::ModifiedBranch;
use crate::release_branch::ReleaseBranch;
use regex::Regex;

pub trait ReleaseBranchFilter {
    fn accept(&mut self, branch: &ReleaseBranch) -> Result<bool>;
}

impl<F> ReleaseBranchFilter for F
where
    F: FnMut(&ReleaseBranch) -> Result<bool>,
{
    fn accept(&mut self, branch: &ReleaseBranch) -> Result<bool> {
        self(branch)
    }
}

pub trait ModifiedBranchFilter {
    fn accept(&mut self, branch: &ModifiedBranch) -> Result<bool>;
}

impl<F> ModifiedBranchFilter for F
where
    F: FnMut(&ModifiedBranch) -> Result<bool>,
{
    fn accept(&mut self, branch: &ModifiedBranch) -> Result<bool> {
        self(branch)
    }
}

/// Predicate over the built HTML of a release branch.
pub trait ContentFilter {
    fn accept(&mut self, html: &str) -> Result<bool>;
}

impl<F> ContentFilter for F
where
    F: FnMut(&str) -> Result<bool>,
{
    fn accept(&mut self, html: &str) -> Result<bool> {
        self(html)
    }
}

/// Matches built output containing a literal string.
#[derive(Debug, Clone)]
pub struct ContainsText(pub String);

impl ContentFilter for ContainsText {
    fn accept(&mut self, html: &str) -> Result<bool> {
        Ok(html.contains(&self.0))
    }
}

/// Matches built output against a regular expression.
#[derive(Debug, Clone)]
pub struct MatchesRegex(pub Regex);

impl ContentFilter for MatchesRegex {
    fn accept(&mut self, html: &str) -> Result<bool> {
        Ok(self.0.is_match(html))
    }
}

/// Inverts a content filter.
#[derive(Debug, Clone)]
pub struct Not<F>(pub F);

impl<F: ContentFilter> ContentFilter for Not<F> {
    fn accept(&mut self, html: &str) -> Result<bool> {
        Ok(!self.0.accept(html)?)
    }
}

/// Restricts to branches of the given repos; an empty list accepts all.
pub fn repo_filter(repos: Vec<String>) -> impl FnMut(&ReleaseBranch) -> Result<bool> {
    move |rb: &ReleaseBranch| Ok(repos.is_empty() || repos.iter().any(|r| *r == rb.repo))
}

/// [`repo_filter`] for modified branches.
pub fn modified_repo_filter(repos: Vec<String>) -> impl FnMut(&ModifiedBranch) -> Result<bool> {
    let mut inner = repo_filter(repos);
    move |mb: &ModifiedBranch| inner(&*mb.release_branch)
}
