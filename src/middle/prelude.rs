//! Items every package can name without importing them

use crate::{
    frontend::{
        ast::{Item, build::AstBuilder},
        intern::InternedSymbol,
    },
    middle::{
        def::{DefId, DefKind, Definitions},
        module_tree::{BindingKind, ModuleTree},
    },
};

/// Builds the prelude's syntax tree, numbering nodes from `first_id` so they
/// never collide with the user's package
pub fn prelude_items(first_id: u32) -> Vec<Item> {
    let b = AstBuilder::starting_at(first_id);

    vec![b.public(b.enumeration(
        "Option",
        &["T"],
        vec![("Some", vec![b.ty("T")]), ("None", vec![])],
    ))]
}

/// Definitions the compiler itself refers to when desugaring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LangItems {
    pub option: DefId,
    pub some: DefId,
    pub none: DefId,
}

impl LangItems {
    pub fn collect(tree: &ModuleTree, defs: &Definitions) -> Option<Self> {
        let binding = tree.modules[tree.prelude]
            .bindings
            .get(&InternedSymbol::new("Option"))?;

        let BindingKind::Def(option) = binding.kind else {
            return None;
        };

        if defs.kind(option) != DefKind::Enum {
            return None;
        }

        Some(Self {
            option,
            some: tree.variant(option, InternedSymbol::new("Some"))?,
            none: tree.variant(option, InternedSymbol::new("None"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        frontend::ast::build::AstBuilder, middle::module_tree::build_module_tree,
        session::Session,
    };

    #[test]
    fn option_is_found_in_the_prelude() {
        let package = AstBuilder::new().package(Some("app"), vec![]);
        let prelude = prelude_items(package.node_count);
        let session = Session::default();

        let (tree, defs) = build_module_tree(&session, &package, &prelude);
        let lang_items = LangItems::collect(&tree, &defs).unwrap();

        assert_eq!(defs.qualified_name(lang_items.some), "<prelude>::Option::Some");
        assert_eq!(defs.kind(lang_items.none), DefKind::Variant);
        assert_eq!(session.error_count(), 0);
    }
}
