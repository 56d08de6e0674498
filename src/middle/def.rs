//! The definition table: every named entity in the package gets a stable
//! [`DefId`] here. Entries are appended while building the module tree and
//! during name resolution and are never modified afterwards, apart from the
//! simplifier renaming property accessors.

use hashbrown::HashMap;
use strum::Display;

use crate::{
    frontend::{ast::NodeId, intern::InternedSymbol, span::Span},
    index::{IndexVec, simple_index},
};

simple_index! {
    /// Identifies a definition anywhere in the compilation unit
    pub struct DefId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DefKind {
    Module,
    Function,
    /// A function declared inside an `impl` or `trait`
    Method,
    Struct,
    Field,
    Enum,
    Variant,
    Trait,
    Impl,
    Const,
    #[strum(serialize = "generic parameter")]
    GenericParam,
    #[strum(serialize = "local binding")]
    Local,
}

impl DefKind {
    pub fn is_type(self) -> bool {
        matches!(
            self,
            DefKind::Struct | DefKind::Enum | DefKind::Trait | DefKind::GenericParam
        )
    }

    pub fn is_value(self) -> bool {
        matches!(
            self,
            DefKind::Function
                | DefKind::Method
                | DefKind::Variant
                | DefKind::Const
                | DefKind::Local
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefVisibility {
    Public,
    /// Visible within the defining module and its descendants
    Module,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub kind: DefKind,
    pub name: InternedSymbol,
    /// The definition lexically enclosing this one (`None` for the root
    /// module and the prelude)
    pub parent: Option<DefId>,
    pub span: Span,
    pub visibility: DefVisibility,
}

#[derive(Debug, Default)]
pub struct Definitions {
    definitions: IndexVec<DefId, Definition>,
    node_to_def: HashMap<NodeId, DefId>,
}

impl Definitions {
    pub fn create(&mut self, node: Option<NodeId>, definition: Definition) -> DefId {
        let def_id = self.definitions.push(definition);

        if let Some(node) = node {
            self.node_to_def.insert(node, def_id);
        }

        def_id
    }

    pub fn get(&self, def_id: DefId) -> &Definition {
        &self.definitions[def_id]
    }

    pub fn kind(&self, def_id: DefId) -> DefKind {
        self.definitions[def_id].kind
    }

    pub fn name(&self, def_id: DefId) -> InternedSymbol {
        self.definitions[def_id].name
    }

    pub fn span(&self, def_id: DefId) -> Span {
        self.definitions[def_id].span
    }

    pub fn parent(&self, def_id: DefId) -> Option<DefId> {
        self.definitions[def_id].parent
    }

    pub fn rename(&mut self, def_id: DefId, name: InternedSymbol) {
        self.definitions[def_id].name = name;
    }

    pub fn def_for_node(&self, node: NodeId) -> Option<DefId> {
        self.node_to_def.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefId, &Definition)> {
        self.definitions.iter_enumerated()
    }

    /// `a::b::c` style path built from the chain of parents
    pub fn qualified_name(&self, def_id: DefId) -> String {
        let mut segments = vec![self.name(def_id).value()];
        let mut current = self.parent(def_id);

        while let Some(parent) = current {
            if self.kind(parent) != DefKind::Impl {
                segments.push(self.name(parent).value());
            }
            current = self.parent(parent);
        }

        segments.reverse();
        segments.join("::")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn definition(kind: DefKind, name: &str, parent: Option<DefId>) -> Definition {
        Definition {
            kind,
            name: InternedSymbol::new(name),
            parent,
            span: Span::DUMMY,
            visibility: DefVisibility::Public,
        }
    }

    #[test]
    fn qualified_names_skip_impl_blocks() {
        let mut defs = Definitions::default();

        let root = defs.create(None, definition(DefKind::Module, "app", None));
        let module = defs.create(None, definition(DefKind::Module, "shapes", Some(root)));
        let imp = defs.create(None, definition(DefKind::Impl, "<impl>", Some(module)));
        let method = defs.create(
            Some(NodeId(7)),
            definition(DefKind::Method, "area", Some(imp)),
        );

        assert_eq!(defs.qualified_name(method), "app::shapes::area");
        assert_eq!(defs.def_for_node(NodeId(7)), Some(method));
        assert_eq!(defs.kind(imp).to_string(), "impl");
    }
}
