//! Child and descendant enumeration.

use crate::ast::AstNode;

/// Lazy pre-order iterator over the descendants of a node, excluding the node itself.
pub struct Descendants<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Descendants<'a> {
    fn new(root: &'a AstNode) -> Self {
        Self {
            stack: root.operands().iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.operands().iter().rev());
        Some(node)
    }
}

impl AstNode {
    /// Direct children, in slot order.
    pub fn children(&self) -> std::slice::Iter<'_, AstNode> {
        self.operands().iter()
    }

    /// This node followed by its direct children.
    pub fn self_and_children(&self) -> impl Iterator<Item = &AstNode> {
        std::iter::once(self).chain(self.children())
    }

    /// All descendants in pre-order, lazily.
    #[must_use]
    pub fn all_descendants(&self) -> Descendants<'_> {
        Descendants::new(self)
    }

    /// This node and all descendants in pre-order, lazily.
    pub fn self_and_descendants(&self) -> impl Iterator<Item = &AstNode> {
        std::iter::once(self).chain(self.all_descendants())
    }

    /// All descendants in pre-order, collected.
    #[must_use]
    pub fn collect_descendants(&self) -> Vec<&AstNode> {
        let mut out = Vec::new();
        Self::collect_into(self, &mut out);
        out
    }

    fn collect_into<'a>(node: &'a AstNode, out: &mut Vec<&'a AstNode>) {
        for child in node.operands() {
            out.push(child);
            Self::collect_into(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{AstNode, BinaryOperator},
        typesystem::{PrimitiveKind, TypeSystem},
    };

    #[test]
    fn test_lazy_and_eager_orders_agree() {
        let types = TypeSystem::new();
        let one = AstNode::integer(&types, PrimitiveKind::I4, 1);
        let two = AstNode::integer(&types, PrimitiveKind::I4, 2);
        let sum = AstNode::binary(BinaryOperator::Add, one.clone(), two.clone(), &types.int32());
        let statement = AstNode::expression_statement(sum.clone());
        let block = AstNode::block(vec![statement.clone(), AstNode::null()]);

        let lazy: Vec<_> = block.all_descendants().collect();
        assert_eq!(lazy, block.collect_descendants());
        assert_eq!(lazy.len(), 5);
        assert_eq!(lazy[0], &statement);
        assert_eq!(lazy[1], &sum);
        assert_eq!(lazy[2], &one);
        assert_eq!(lazy[3], &two);
        assert!(lazy[4].is_null());

        assert_eq!(block.self_and_children().count(), 3);
        assert_eq!(block.self_and_descendants().count(), 6);
    }
}
