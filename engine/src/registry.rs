//! Boat registry: owns every live boat, keyed by name, plus an insertion-order
//! index for stable iteration and a group-membership index.
//!
//! All mutation happens under a single `tokio::sync::RwLock` held by callers
//! (Scheduler, Request server); this module does not take the lock itself —
//! it is the payload the lock protects, following the teacher's
//! `Arc<RwLock<RaceState>>` construction in `main.rs`.

use std::collections::HashMap;

use crate::boat::Boat;
use crate::error::RegistryError;

/// A registered boat plus its registry-level metadata.
pub struct Entry {
    pub boat: Boat,
    pub group: Option<String>,
    pub alt_name: Option<String>,
}

#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
    groups: HashMap<String, Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(
        &mut self,
        name: &str,
        boat: Boat,
        group: Option<String>,
        alt_name: Option<String>,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError::Exists(name.to_string()));
        }

        if let Some(g) = &group {
            self.groups.entry(g.clone()).or_default().push(name.to_string());
        }

        self.entries.insert(
            name.to_string(),
            Entry {
                boat,
                group,
                alt_name,
            },
        );
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        let entry = self.entries.remove(name)?;
        self.order.retain(|n| n != name);
        if let Some(g) = &entry.group {
            if let Some(members) = self.groups.get_mut(g) {
                members.retain(|n| n != name);
                if members.is_empty() {
                    self.groups.remove(g);
                }
            }
        }
        Some(entry)
    }

    /// Iterates live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.order.iter().filter_map(move |name| self.entries.get(name).map(|e| (name, e)))
    }

    pub fn names_in_order(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn group_add_boat(&mut self, group: &str, name: &str, alt_name: Option<String>) -> Result<(), RegistryError> {
        let entry = self.entries.get_mut(name).ok_or_else(|| RegistryError::NotExists(name.to_string()))?;
        entry.group = Some(group.to_string());
        entry.alt_name = alt_name;
        let members = self.groups.entry(group.to_string()).or_default();
        if !members.iter().any(|n| n == name) {
            members.push(name.to_string());
        }
        Ok(())
    }

    pub fn group_remove_boat(&mut self, group: &str, name: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.retain(|n| n != name);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    /// Formats the `boatgroupmembers` response body (without the leading
    /// `boatgroupmembers,<name>,<status>` header line, which the request
    /// handler prepends).
    pub fn group_membership_response(&self, requester: &str) -> Option<String> {
        let requester_entry = self.entries.get(requester)?;
        let group = requester_entry.group.as_ref()?;

        if requester_entry
            .boat
            .flags
            .contains(sailnavsim_types::BoatFlags::LIVE_SHARING_HIDDEN)
        {
            return Some(format!("{},?\n", requester));
        }

        let members = self.groups.get(group)?;
        let mut out = String::new();
        for name in members {
            if let Some(entry) = self.entries.get(name) {
                let alt = entry.alt_name.as_deref().unwrap_or("!");
                out.push_str(&format!("{},{}\n", name, alt));
            }
        }
        Some(out)
    }
}

impl Registry {
    /// Applies `f` to every live entry by name, one `get_mut` at a time.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&str, &mut Entry)) {
        let names = self.order.clone();
        for name in names {
            if let Some(entry) = self.entries.get_mut(&name) {
                f(&name, entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boat::Boat;
    use sailnavsim_types::GeoPos;

    fn sample_boat() -> Boat {
        Boat::new("t".into(), GeoPos::new(0.0, 0.0), 0, 0, 0)
    }

    #[test]
    fn add_then_remove_is_identity() {
        let mut reg = Registry::new();
        reg.add("alice", sample_boat(), None, None).unwrap();
        assert_eq!(reg.len(), 1);
        let removed = reg.remove("alice").unwrap();
        assert_eq!(removed.boat.name, "t");
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn duplicate_add_fails() {
        let mut reg = Registry::new();
        reg.add("alice", sample_boat(), None, None).unwrap();
        assert!(reg.add("alice", sample_boat(), None, None).is_err());
    }

    #[test]
    fn group_membership_hides_flagged_boat() {
        let mut reg = Registry::new();
        let mut hidden = sample_boat();
        hidden.flags = sailnavsim_types::BoatFlags::LIVE_SHARING_HIDDEN;
        reg.add("a", hidden, Some("G".into()), Some("AliceAlt".into())).unwrap();
        reg.add("b", sample_boat(), Some("G".into()), Some("BobAlt".into())).unwrap();

        let resp_a = reg.group_membership_response("a").unwrap();
        assert_eq!(resp_a, "a,?\n");

        let resp_b = reg.group_membership_response("b").unwrap();
        assert!(resp_b.contains("a,AliceAlt"));
        assert!(resp_b.contains("b,BobAlt"));
    }
}
