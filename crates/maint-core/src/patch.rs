use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a patch. Modified branches hold clones of the same handle
/// that [`crate::state::Maintenance::patches`] holds.
pub type PatchRef = Rc<RefCell<Patch>>;

/// A named fix that may need to be cherry-picked onto release branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub repo: String,
    pub name: String,
    pub message: String,
    /// Candidate commits, tried in order.
    #[serde(default)]
    pub shas: Vec<String>,
}

impl Patch {
    pub fn new(repo: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
            message: message.into(),
            shas: Vec::new(),
        }
    }

    pub fn into_ref(self) -> PatchRef {
        Rc::new(RefCell::new(self))
    }

    /// Append a candidate sha. Returns `false` if already listed.
    pub fn add_sha(&mut self, sha: &str) -> bool {
        if self.shas.iter().any(|s| s == sha) {
            return false;
        }
        self.shas.push(sha.to_string());
        true
    }

    /// Remove a candidate sha. Returns `false` if not present.
    pub fn remove_sha(&mut self, sha: &str) -> bool {
        let before = self.shas.len();
        self.shas.retain(|s| s != sha);
        self.shas.len() < before
    }
}
