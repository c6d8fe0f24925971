//! Block — the container member.
//!
//! A block owns an ordered list of child members (roles unique among
//! siblings) and answers the membership introspection methods. All
//! command routing descends through blocks: a call addressed at a
//! non-local oid is resolved by depth-first search.

use serde_json::{json, Value};

use crate::descriptors::BlockMemberDescriptor;
use crate::object::{sequence_item, to_json, Member, ObjectCore};
use crate::types::{
    arg_bool, arg_element_id, arg_index, class_id_key, ElementId, MethodOutcome, MethodStatus,
    PropertyChangeType,
};

/// Property id of the `members` sequence (`2p2`).
const MEMBERS_PROPERTY: ElementId = ElementId::new(2, 2);

#[derive(Debug)]
pub struct Block {
    pub core: ObjectCore,
    pub is_root: bool,
    pub enabled: bool,
    pub members: Vec<Member>,
}

impl Block {
    pub fn new(core: ObjectCore, is_root: bool, enabled: bool) -> Self {
        Self {
            core,
            is_root,
            enabled,
            members: Vec::new(),
        }
    }

    /// Append a child. The only structural mutation in the model;
    /// emits a members-changed event carrying the regenerated list.
    pub fn add_member(&mut self, member: Member) {
        self.members.push(member);
        self.core.notify(
            MEMBERS_PROPERTY,
            PropertyChangeType::ValueChanged,
            to_json(&self.member_descriptors()),
            None,
        );
    }

    /// Depth-first search for a member by oid.
    pub fn find_member(&self, oid: u64) -> Option<&Member> {
        for m in &self.members {
            if m.core().oid == oid {
                return Some(m);
            }
            if let Member::Block(b) = m {
                if let Some(found) = b.find_member(oid) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn find_member_mut(&mut self, oid: u64) -> Option<&mut Member> {
        for m in &mut self.members {
            if m.core().oid == oid {
                return Some(m);
            }
            if let Member::Block(b) = m {
                if let Some(found) = b.find_member_mut(oid) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Current children in wire descriptor form, insertion-ordered.
    pub fn member_descriptors(&self) -> Vec<BlockMemberDescriptor> {
        self.members
            .iter()
            .map(|m| m.descriptor(self.core.oid))
            .collect()
    }

    // ── Property access ─────────────────────────────────────

    pub(crate) fn get_local(&self, id: ElementId) -> MethodOutcome {
        match (id.level, id.index) {
            (2, 1) => MethodOutcome::ok(json!(self.enabled)),
            (2, 2) => MethodOutcome::ok(to_json(&self.member_descriptors())),
            _ => self.core.base_property(id),
        }
    }

    pub(crate) fn set_local(&mut self, id: ElementId, value: &Value) -> MethodOutcome {
        if id.level == 2 {
            return MethodOutcome::err(
                MethodStatus::Readonly,
                "Could not find the property or it is read-only",
            );
        }
        self.core.set_base_property(id, value)
    }

    // ── Method dispatch ─────────────────────────────────────

    pub(crate) fn invoke_local(&self, method: ElementId, args: &Value) -> MethodOutcome {
        match (method.level, method.index) {
            (2, 1) => MethodOutcome::ok(to_json(&self.get_member_descriptors(args))),
            (2, 2) => MethodOutcome::ok(to_json(&self.find_members_by_path_args(args))),
            (2, 3) => MethodOutcome::ok(to_json(&self.find_members_by_role(args))),
            (2, 4) => MethodOutcome::ok(to_json(&self.find_members_by_class_id(args))),
            // Sequence operations addressed at the members property are
            // serviced here; anything else falls through to the base.
            (1, 3..=7) if arg_element_id(args) == Some(MEMBERS_PROPERTY) => {
                let seq: Vec<Value> = self.member_descriptors().iter().map(to_json).collect();
                match method.index {
                    3 => {
                        let Some(index) = arg_index(args) else {
                            return MethodOutcome::err(
                                MethodStatus::ParameterError,
                                "Invalid index parameter",
                            );
                        };
                        sequence_item(&seq, index)
                    }
                    7 => MethodOutcome::ok(json!(seq.len())),
                    _ => MethodOutcome::err(
                        MethodStatus::Readonly,
                        "Sequence property is read-only",
                    ),
                }
            }
            _ => self.core.invoke_base(method, args),
        }
    }

    // ── 2m1 GetMemberDescriptors ────────────────────────────

    fn get_member_descriptors(&self, args: &Value) -> Vec<BlockMemberDescriptor> {
        let recurse = arg_bool(args, "recurse");
        let mut results = self.member_descriptors();
        if recurse {
            for m in &self.members {
                if let Member::Block(b) = m {
                    results.extend(b.get_member_descriptors(args));
                }
            }
        }
        results
    }

    // ── 2m2 FindMembersByPath ───────────────────────────────

    fn find_members_by_path_args(&self, args: &Value) -> Vec<BlockMemberDescriptor> {
        let Some(path) = args.get("path").and_then(Value::as_array) else {
            return Vec::new();
        };
        let segments: Vec<&str> = path
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Vec::new();
        }
        self.find_members_by_path(&segments)
    }

    fn find_members_by_path(&self, segments: &[&str]) -> Vec<BlockMemberDescriptor> {
        let Some((first, rest)) = segments.split_first() else {
            return Vec::new();
        };
        let mut results = Vec::new();
        for m in &self.members {
            if m.core().role == *first {
                if rest.is_empty() {
                    results.push(m.descriptor(self.core.oid));
                } else if let Member::Block(b) = m {
                    results.extend(b.find_members_by_path(rest));
                }
            }
        }
        results
    }

    // ── 2m3 FindMembersByRole ───────────────────────────────

    fn find_members_by_role(&self, args: &Value) -> Vec<BlockMemberDescriptor> {
        let role = args
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if role.is_empty() {
            return Vec::new();
        }

        let case_sensitive = arg_bool(args, "caseSensitive");
        let match_whole = arg_bool(args, "matchWholeString");
        let recurse = arg_bool(args, "recurse");

        let needle = if case_sensitive {
            role.to_string()
        } else {
            role.to_lowercase()
        };
        let matches = |candidate: &str| {
            if candidate.is_empty() {
                return false;
            }
            let target = if case_sensitive {
                candidate.to_string()
            } else {
                candidate.to_lowercase()
            };
            if match_whole {
                target == needle
            } else {
                target.contains(&needle)
            }
        };

        let mut results: Vec<BlockMemberDescriptor> = self
            .members
            .iter()
            .filter(|m| matches(&m.core().role))
            .map(|m| m.descriptor(self.core.oid))
            .collect();

        if recurse {
            for m in &self.members {
                if let Member::Block(b) = m {
                    results.extend(b.find_members_by_role(args));
                }
            }
        }
        results
    }

    // ── 2m4 FindMembersByClassId ────────────────────────────

    fn find_members_by_class_id(&self, args: &Value) -> Vec<BlockMemberDescriptor> {
        let class_id: Vec<i32> = match args.get("classId").and_then(Value::as_array) {
            Some(items) => {
                let parsed: Option<Vec<i32>> = items
                    .iter()
                    .map(|v| v.as_i64().map(|x| x as i32))
                    .collect();
                match parsed {
                    Some(ids) => ids,
                    None => return Vec::new(),
                }
            }
            None => return Vec::new(),
        };
        if class_id.is_empty() {
            return Vec::new();
        }

        let include_derived = arg_bool(args, "includeDerived");
        let recurse = arg_bool(args, "recurse");

        let needle = class_id_key(&class_id);
        let matches = |candidate: &[i32]| {
            let key = class_id_key(candidate);
            if include_derived {
                key.starts_with(&needle)
            } else {
                key == needle
            }
        };

        let mut results: Vec<BlockMemberDescriptor> = self
            .members
            .iter()
            .filter(|m| matches(&m.core().class_id))
            .map(|m| m.descriptor(self.core.oid))
            .collect();

        if recurse {
            for m in &self.members {
                if let Member::Block(b) = m {
                    results.extend(b.find_members_by_class_id(args));
                }
            }
        }

        // The root block is not a child of anything, so it appends its
        // own descriptor when its class matches.
        if self.is_root && matches(&self.core.class_id) {
            results.push(BlockMemberDescriptor {
                role: self.core.role.clone(),
                oid: self.core.oid,
                constant_oid: self.core.constant_oid,
                class_id: self.core.class_id.clone(),
                user_label: self.core.user_label.clone().unwrap_or_default(),
                owner: self.core.oid,
            });
        }
        results
    }
}

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
