//! Class table
//!
//! Every class type refers to a [`ClassId`]. Declaring a class by a name that
//! is already known returns the existing id, so separately compiled
//! declarations of the same class share one definition.

use rustc_hash::FxHashMap;

use super::Type;

/// Stable identifier of a class type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

/// One non-static data member
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: String,
    pub ty: Type,
    /// Byte offset from the start of the class object
    pub offset: u64,
}

/// Layout information for one class
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub base: Option<ClassId>,
    pub members: Vec<MemberInfo>,
    pub size: u64,
    pub is_complete: bool,
    /// Translation unit that supplied the definition
    pub defined_in: Option<usize>,
}

/// All class types of a program
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: Vec<ClassInfo>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class by qualified name, reusing the id of an earlier declaration
    pub fn declare(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ClassId(self.classes.len());
        self.classes.push(ClassInfo {
            name: name.to_string(),
            base: None,
            members: Vec::new(),
            size: 0,
            is_complete: false,
            defined_in: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Complete a declared class: the base subobject comes first, then members
    /// in declaration order.
    pub fn define(&mut self, id: ClassId, base: Option<ClassId>, members: Vec<(String, Type)>) {
        let mut offset = base.and_then(|b| self.get(b)).map_or(0, |b| b.size);
        let mut laid_out = Vec::with_capacity(members.len());
        for (name, ty) in members {
            let size = ty.size(self);
            laid_out.push(MemberInfo { name, ty, offset });
            offset += size;
        }

        if let Some(info) = self.classes.get_mut(id.0) {
            info.base = base;
            info.members = laid_out;
            info.size = offset;
            info.is_complete = true;
        }
    }

    pub fn set_defined_in(&mut self, id: ClassId, unit: usize) {
        if let Some(info) = self.classes.get_mut(id.0) {
            info.defined_in = Some(unit);
        }
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(id.0)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: ClassId) -> &str {
        self.get(id).map_or("<unknown class>", |c| c.name.as_str())
    }

    /// The class type for an id
    pub fn class_type(&self, id: ClassId) -> Type {
        Type::class(id, self.name(id))
    }

    /// Whether `derived` has `base` as a proper (direct or indirect) base class
    pub fn is_derived_from(&self, derived: ClassId, base: ClassId) -> bool {
        let mut current = self.get(derived).and_then(|c| c.base);
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = self.get(id).and_then(|c| c.base);
        }
        false
    }

    /// Find a data member by name, searching base classes.
    /// Returns the class that declares it and the member index.
    pub fn find_member(&self, id: ClassId, name: &str) -> Option<(ClassId, usize)> {
        let mut current = Some(id);
        while let Some(class_id) = current {
            let info = self.get(class_id)?;
            if let Some(index) = info.members.iter().position(|m| m.name == name) {
                return Some((class_id, index));
            }
            current = info.base;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_reuses_id() {
        let mut classes = ClassTable::new();
        let first = classes.declare("Point");
        let second = classes.declare("Point");
        assert_eq!(first, second);
        assert_eq!(classes.len(), 1);
    }

    #[test]
    fn test_member_offsets_follow_base() {
        let mut classes = ClassTable::new();
        let base = classes.declare("Base");
        let derived = classes.declare("Derived");
        classes.define(base, None, vec![("a".into(), Type::int()), ("b".into(), Type::char())]);
        classes.define(derived, Some(base), vec![("c".into(), Type::double())]);

        let info = classes.get(derived).unwrap();
        assert_eq!(info.members[0].offset, 5);
        assert_eq!(info.size, 13);
        assert_eq!(classes.find_member(derived, "a"), Some((base, 0)));
        assert_eq!(classes.find_member(derived, "c"), Some((derived, 0)));
        assert_eq!(classes.find_member(derived, "zz"), None);
    }
}
