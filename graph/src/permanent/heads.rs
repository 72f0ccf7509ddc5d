use crate::core::{CommitId, VcsRef};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Decides which head a commit is drawn under and what color that head gets.
pub trait HeadColorManager {
    fn color(&self, head: &CommitId) -> u32;

    /// `Greater` means `a` is preferred over `b`. Must be a total order.
    fn compare_heads(&self, a: &CommitId, b: &CommitId) -> Ordering;
}

/// Prefers heads carrying high-priority ref names (`HEAD`, `main`, ...).
pub struct RefColorManager {
    refs_by_head: HashMap<CommitId, Vec<String>>,
    priority: Vec<String>,
}

impl RefColorManager {
    pub fn new(refs: &[VcsRef], priority: Vec<String>) -> Self {
        let mut refs_by_head: HashMap<CommitId, Vec<String>> = HashMap::new();
        for r in refs {
            refs_by_head
                .entry(r.target.clone())
                .or_default()
                .push(r.name.clone());
        }
        for names in refs_by_head.values_mut() {
            names.sort();
        }
        Self {
            refs_by_head,
            priority,
        }
    }

    /// Lower is better
    fn rank(&self, head: &CommitId) -> usize {
        let Some(names) = self.refs_by_head.get(head) else {
            return self.priority.len() + 1;
        };
        names
            .iter()
            .filter_map(|name| self.priority.iter().position(|p| p == name))
            .min()
            .unwrap_or(self.priority.len())
    }

    fn preferred_name(&self, head: &CommitId) -> Option<&str> {
        let names = self.refs_by_head.get(head)?;
        names
            .iter()
            .min_by_key(|name| {
                self.priority
                    .iter()
                    .position(|p| p == *name)
                    .unwrap_or(self.priority.len())
            })
            .map(String::as_str)
    }
}

impl Default for RefColorManager {
    fn default() -> Self {
        Self::new(&[], Vec::new())
    }
}

impl HeadColorManager for RefColorManager {
    fn color(&self, head: &CommitId) -> u32 {
        let key = self.preferred_name(head).unwrap_or(head.as_str());
        stable_color(key)
    }

    fn compare_heads(&self, a: &CommitId, b: &CommitId) -> Ordering {
        self.rank(b)
            .cmp(&self.rank(a))
            .then_with(|| b.cmp(a))
    }
}

/// FNV-1a, so a branch keeps its color across sessions
pub fn stable_color(name: &str) -> u32 {
    let mut hash: u64 = 1469598103934665603;
    for b in name.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash ^ (hash >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RefColorManager {
        RefColorManager::new(
            &[
                VcsRef::new("feature", "f"),
                VcsRef::new("main", "m"),
                VcsRef::new("HEAD", "h"),
            ],
            vec!["HEAD".into(), "main".into()],
        )
    }

    #[test]
    fn priority_refs_win() {
        let m = manager();
        assert_eq!(m.compare_heads(&"h".into(), &"m".into()), Ordering::Greater);
        assert_eq!(m.compare_heads(&"m".into(), &"f".into()), Ordering::Greater);
        assert_eq!(m.compare_heads(&"f".into(), &"x".into()), Ordering::Greater);
    }

    #[test]
    fn unnamed_heads_tie_break_on_id() {
        let m = manager();
        assert_eq!(m.compare_heads(&"a".into(), &"b".into()), Ordering::Greater);
        assert_eq!(m.compare_heads(&"b".into(), &"a".into()), Ordering::Less);
    }

    #[test]
    fn colors_follow_ref_names() {
        let m = manager();
        assert_eq!(m.color(&"m".into()), stable_color("main"));
        assert_eq!(m.color(&"zz".into()), stable_color("zz"));
    }
}
