// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::cell::RefCell;
use std::collections::HashMap;

use dtfabric_expr::ExprContext;

use crate::value::Value;

/// One scope of the decode-time value tree (§3.6, §9): the member values
/// decoded so far in one structure, plus the completed child scopes of any
/// nested structures already decoded as members.
///
/// Interior mutability (`RefCell`) lets a structure decode record each
/// member as it completes while an [`Scope`] borrowing this context is
/// already in use to evaluate later members' expressions — the MapContext
/// is single-writer per decode (§5), never shared across concurrent ones.
#[derive(Debug, Default)]
pub struct MapContext {
    name: String,
    locals: RefCell<HashMap<String, i64>>,
    children: RefCell<HashMap<String, MapContext>>,
}

impl MapContext {
    /// Creates an empty scope labelled `name` (the owning structure's name).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locals: RefCell::new(HashMap::new()),
            children: RefCell::new(HashMap::new()),
        }
    }

    /// Records a decoded member's value under `member_name`, if the value is
    /// integer-representable; expressions can only reference such members.
    pub fn record(&self, member_name: &str, value: &Value) {
        if let Some(v) = value.as_integer() {
            self.locals.borrow_mut().insert(member_name.to_owned(), v);
        }
    }

    /// Attaches `child` as a nested scope, keyed by its own name.
    pub fn attach(&self, child: MapContext) {
        self.children.borrow_mut().insert(child.name.clone(), child);
    }

    fn resolve_local(&self, path: &[String]) -> Option<i64> {
        match path {
            [only] => self.locals.borrow().get(only).copied(),
            [head, rest @ ..] => {
                let children = self.children.borrow();
                // Re-borrow by name rather than holding the Ref across
                // recursion: `children.get` returns a reference tied to this
                // borrow, which is fine since the recursive call only reads.
                children.get(head).and_then(|c| c.resolve_local(rest))
            }
            [] => None,
        }
    }
}

/// A live view over a [`MapContext`] during decode: the scope currently
/// being built plus the chain of enclosing scopes (§9: "path resolution
/// walks from the innermost scope outward"). Sibling structures are not
/// visible — only this scope, its already-decoded children, and ancestors.
pub struct Scope<'a> {
    current: &'a MapContext,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// A root scope with no enclosing context (a top-level `format`/`structure` decode).
    pub fn root(current: &'a MapContext) -> Self {
        Self { current, parent: None }
    }

    /// A scope nested one level inside `parent`.
    pub fn nested(current: &'a MapContext, parent: &'a Scope<'a>) -> Self {
        Self {
            current,
            parent: Some(parent),
        }
    }

    /// The context this scope is currently building, so a nested decode can
    /// attach its completed child context once it is done with it.
    pub(crate) fn current(&self) -> &'a MapContext {
        self.current
    }
}

impl ExprContext for Scope<'_> {
    fn resolve(&self, path: &[String]) -> Option<i64> {
        self.current
            .resolve_local(path)
            .or_else(|| self.parent.and_then(|p| p.resolve(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_sibling_in_the_same_scope() {
        let ctx = MapContext::new("sphere3d");
        ctx.record("number_of_triangles", &Value::Integer(2));
        let scope = Scope::root(&ctx);
        assert_eq!(scope.resolve(&["number_of_triangles".to_string()]), Some(2));
    }

    #[test]
    fn resolves_through_a_nested_child_scope() {
        let child = MapContext::new("sphere3d");
        child.record("number_of_triangles", &Value::Integer(2));
        let parent = MapContext::new("root");
        parent.attach(child);
        let scope = Scope::root(&parent);
        assert_eq!(
            scope.resolve(&["sphere3d".to_string(), "number_of_triangles".to_string()]),
            Some(2)
        );
    }

    #[test]
    fn walks_outward_to_an_ancestor() {
        let grandparent = MapContext::new("root");
        grandparent.record("version", &Value::Integer(2));
        let gp_scope = Scope::root(&grandparent);
        let child = MapContext::new("header");
        let scope = Scope::nested(&child, &gp_scope);
        assert_eq!(scope.resolve(&["version".to_string()]), Some(2));
    }

    #[test]
    fn unbound_path_resolves_to_none() {
        let ctx = MapContext::new("root");
        let scope = Scope::root(&ctx);
        assert_eq!(scope.resolve(&["missing".to_string()]), None);
    }
}
