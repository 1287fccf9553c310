//! Declaration of locals and temporaries.

use std::collections::HashSet;

use crate::{
    ast::{AstNode, NodeKind, VariableRc},
    passes::{AstPass, PassContext},
    translator::TranslatedMethod,
    Result,
};

/// Prepends one declaration statement naming every local and temporary the body uses.
///
/// Parameters are declared by the method signature and never appear. Runs once per method,
/// after every pass that may allocate temporaries.
pub struct DeclareVariablesPass;

impl AstPass for DeclareVariablesPass {
    fn name(&self) -> &'static str {
        "declare variables"
    }

    fn description(&self) -> &'static str {
        "Declares the locals and temporaries referenced by the body"
    }

    fn should_run(&self, method: &TranslatedMethod, _ctx: &PassContext) -> bool {
        !method.variables_declared
    }

    fn run_on_method(&self, method: &mut TranslatedMethod, _ctx: &PassContext) -> Result<bool> {
        let referenced = referenced_ids(&method.body);
        let declared: Vec<AstNode> = method
            .locals
            .iter()
            .chain(&method.temporaries)
            .filter(|variable| !variable.is_parameter() && referenced.contains(&variable.id()))
            .map(AstNode::variable)
            .collect();
        method.variables_declared = true;
        if declared.is_empty() {
            return Ok(false);
        }

        let declaration = AstNode::build(NodeKind::VariableDeclaration, declared);
        if matches!(method.body.kind(), NodeKind::Block { label: None }) {
            method.body.operands_mut().insert(0, declaration);
        } else {
            let body = std::mem::replace(&mut method.body, AstNode::null());
            method.body = AstNode::block(vec![declaration, body]);
        }
        Ok(true)
    }
}

fn referenced_ids(body: &AstNode) -> HashSet<usize> {
    let mut ids = HashSet::new();
    let mut note = |variable: &VariableRc| {
        ids.insert(variable.id());
    };
    for node in body.self_and_descendants() {
        match node.kind() {
            NodeKind::Variable(variable) => note(variable),
            NodeKind::Try {
                catch_variable: Some(variable),
            } => note(variable),
            _ => {}
        }
    }
    ids
}
