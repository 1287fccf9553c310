//! Driver integration tests: translation followed by the rewrite pipeline.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dotscript::{
    ast::{ConversionKind, NodeKind},
    driver::TranslationDriver,
    il::{ILBlock, ILCode, ILExpression, ILNode, ILVariable, ILVariableKind, MethodBody},
    metadata::{MethodDescriptor, MethodFlags, MethodRc, NullOracle},
    passes::{AstPass, DeclareVariablesPass, PassContext, PassScheduler},
    translator::{MethodTranslator, TranslatedMethod},
    typesystem::{ModuleScope, PrimitiveKind, TypeCategory, TypeDefinition, TypeSystem},
    Result, TranslatorConfig,
};

fn run_method(types: &TypeSystem, name: &str) -> MethodRc {
    let scope = ModuleScope::new("App");
    let program = types.define(
        TypeDefinition::new("App", "Program", &scope, TypeCategory::Class),
        Some(&types.object()),
    );
    MethodDescriptor::new(name, &program, &types.void())
        .with_flags(MethodFlags::STATIC)
        .into_rc()
}

/// `long wide = (long)narrow;`
fn widening_body(types: &TypeSystem, name: &str) -> MethodBody {
    let method = run_method(types, name);
    let narrow = ILVariable::new("narrow", &types.int32(), ILVariableKind::Local(0));
    let wide = ILVariable::new(
        "wide",
        &types.primitive(PrimitiveKind::I8),
        ILVariableKind::Local(1),
    );
    let statement = ILExpression::stloc(
        &wide,
        ILExpression::op(ILCode::ConvI8, vec![ILExpression::ldloc(&narrow)]),
    );
    MethodBody::new(&method, Vec::new(), ILBlock::new(vec![ILNode::Expression(statement)]))
        .with_locals(vec![narrow, wide])
}

fn driver(types: &Arc<TypeSystem>, config: TranslatorConfig) -> TranslationDriver {
    TranslationDriver::new(MethodTranslator::with_oracle(
        types.clone(),
        Arc::new(NullOracle),
        config,
    ))
}

#[test]
fn test_int64_widening_is_emulated() {
    let types = Arc::new(TypeSystem::new());
    let body = widening_body(&types, "Run");

    let outcome = driver(&types, TranslatorConfig::default()).translate_method(&body);
    assert!(!outcome.is_stub());
    let method = outcome.method();
    assert!(matches!(method.body.operands()[0].kind(), NodeKind::VariableDeclaration));
    assert!(method.body.self_and_descendants().any(|n| matches!(
        n.kind(),
        NodeKind::IntrinsicCall {
            name: "Int64FromNumber",
            ..
        }
    )));
    assert!(!method
        .body
        .self_and_descendants()
        .any(|n| matches!(n.kind(), NodeKind::Cast { .. })));
}

#[test]
fn test_native_int64_widens() {
    let types = Arc::new(TypeSystem::new());
    let body = widening_body(&types, "Run");

    let outcome = driver(&types, TranslatorConfig::native_int64()).translate_method(&body);
    assert!(outcome.method().body.self_and_descendants().any(|n| matches!(
        n.kind(),
        NodeKind::Conversion {
            kind: ConversionKind::Widen,
            ..
        }
    )));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let types = Arc::new(TypeSystem::new());
    let bodies: Vec<MethodBody> = (0..16)
        .map(|i| widening_body(&types, &format!("Run{i}")))
        .collect();

    let parallel = driver(&types, TranslatorConfig::default()).translate_all(&bodies);
    let sequential = driver(
        &types,
        TranslatorConfig {
            parallel: false,
            ..TranslatorConfig::default()
        },
    )
    .translate_all(&bodies);

    assert_eq!(parallel.len(), bodies.len());
    for (left, right) in parallel.iter().zip(&sequential) {
        assert_eq!(left.method().method.name, right.method().method.name);
        assert_eq!(left.method().body, right.method().body);
    }
}

/// Counts its invocations and never changes anything.
struct CountingPass(Arc<AtomicUsize>);

impl AstPass for CountingPass {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn run_on_method(&self, _method: &mut TranslatedMethod, _ctx: &PassContext) -> Result<bool> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(false)
    }
}

#[test]
fn test_custom_pipeline_stops_when_stable() {
    let types = Arc::new(TypeSystem::new());
    let body = widening_body(&types, "Run");
    let runs = Arc::new(AtomicUsize::new(0));

    let mut scheduler = PassScheduler::new(8);
    scheduler.passes.push(Box::new(CountingPass(runs.clone())));
    scheduler.cleanup.push(Box::new(DeclareVariablesPass));
    let translator =
        MethodTranslator::with_oracle(types.clone(), Arc::new(NullOracle), TranslatorConfig::raw());
    let outcome = TranslationDriver::with_scheduler(translator, scheduler).translate_method(&body);

    assert_eq!(runs.load(Ordering::Relaxed), 1);
    let method = outcome.method();
    assert!(method.variables_declared);
    // Casts are left for the host when cast expansion is not scheduled.
    assert!(method
        .body
        .self_and_descendants()
        .any(|n| matches!(n.kind(), NodeKind::Cast { .. })));
}
