use netbuilder::config::{ConfigRecord, Evaluator, Value, parse, prelude};
use netbuilder::network::{ComputationNetwork, NodeDetail, NodeKind, ParameterInit, RoleGroup};
use netbuilder::runtime::{
    BoxedValue, BuildContext, Constructor, ObjectRef, Precision, RuntimeTypeRegistry, Taggable,
    downcast,
};
use netbuilder::{BuildOptions, BuiltNetwork, Error, NetworkBuilder, build};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

fn evaluate(source: &str) -> Evaluator {
    let prelude = prelude::standard().unwrap();
    let script = parse(source).unwrap();
    Evaluator::new(
        &[&prelude, &script],
        RuntimeTypeRegistry::global(),
        BuildContext::default(),
    )
    .unwrap()
}

fn float_network(ev: &Evaluator) -> netbuilder::Result<Rc<ComputationNetwork<f32>>> {
    match ev.evaluate_field("network")? {
        Value::Object(o) => Ok(downcast::<ComputationNetwork<f32>>(&o).expect("float network")),
        other => panic!("network is {:?}", other),
    }
}

fn builder(source: &str) -> NetworkBuilder<f32> {
    NetworkBuilder::new(source, BuildOptions::default())
}

#[test]
fn end_to_end_scenario() {
    let ev = evaluate(
        "deviceId = -1 ; precision = 'float'
         W = Parameter(3, 3)
         B = Parameter(3, 1, init = 'fixedValue', value = 0)
         z = W * Input(3, 1) + B
         network = new ComputationNetwork [ out = z ]",
    );
    let net = float_network(&ev).unwrap();

    // `*` and `+` each produce a node, so `z` is a Plus over an anonymous Times.
    // Together `z` and `Times#2` make up z's composite: five names instead of four.
    assert_eq!(net.node_names(), vec!["z", "Times#2", "B", "W", "Input#1"]);
    assert_eq!(net.node("z").unwrap().kind(), NodeKind::Plus);
    assert_eq!(net.node("Times#2").unwrap().input_names(), vec!["W", "Input#1"]);
    assert!(matches!(
        net.node("B").unwrap().detail(),
        NodeDetail::Parameter { init: ParameterInit::FixedValue(v), .. } if *v == 0.0
    ));
    for group in RoleGroup::ALL {
        assert!(net.group(group).is_empty(), "{:?}", group);
    }
    assert_eq!(net.device_id(), -1);

    let stats = ev.context().stats();
    assert_eq!(stats.constructed, 6);
    assert_eq!(stats.randomized, 1);
    assert_eq!(stats.finalized, 0);
}

#[test]
fn builder_names_members_from_the_network_root() {
    let mut b = builder(
        "[
            W = Parameter(3, 3)
            B = Parameter(3, 1, init = 'fixedValue', value = 0)
            z = W * Input(3, 1) + B
        ]",
    );
    let net = b.build_network_from_description().unwrap();
    assert_eq!(net.len(), 5);
    for name in ["W", "B", "z"] {
        assert!(net.node(name).is_some(), "missing {}", name);
    }
    assert_eq!(net.precision(), Precision::Float);
}

thread_local! {
    static PROBES: Cell<usize> = const { Cell::new(0) };
}

fn probe(_record: &ConfigRecord, _ctx: &BuildContext) -> netbuilder::Result<ObjectRef> {
    PROBES.with(|c| c.set(c.get() + 1));
    Ok(Rc::new(BoxedValue::new("Probe", Value::Number(1.0))))
}

fn probing_registry() -> Arc<RuntimeTypeRegistry> {
    let mut registry = RuntimeTypeRegistry::standard();
    registry.register("Probe", Constructor::Single(probe));
    Arc::new(registry)
}

#[test]
fn repeated_builds_return_the_cached_network() {
    PROBES.with(|c| c.set(0));
    let mut b = builder("[ x = Input(2) ; p = new Probe [ ] ]").with_registry(probing_registry());

    let first = b.build_network_from_description().unwrap();
    let stats = b.stats();
    assert_eq!(PROBES.with(Cell::get), 1);

    let second = b.build_network_from_description().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(PROBES.with(Cell::get), 1);
    assert_eq!(b.stats(), stats);
}

#[test]
fn empty_networks_are_not_cached() {
    PROBES.with(|c| c.set(0));
    let mut b = builder("[ p = new Probe [ ] ]").with_registry(probing_registry());
    assert!(b.build_network_from_description().unwrap().is_empty());
    assert!(b.build_network_from_description().unwrap().is_empty());
    assert_eq!(PROBES.with(Cell::get), 2);
}

#[test]
fn distinct_nodes_with_the_same_name_conflict() {
    let ev = evaluate(
        "precision = 'float'
         W = Parameter(2, 2)
         alias = W
         network = new ComputationNetwork [ W = Parameter(2, 2) ; out = W + alias ]",
    );
    assert_eq!(float_network(&ev).unwrap_err(), Error::NamingConflict("W".into()));
}

#[test]
fn shared_nodes_are_visited_once() {
    let mut b = builder("[ x = Input(2) ; a = Sigmoid(x) ; b = Tanh(x) ; out = a + b ; again = out ]");
    let net = b.build_network_from_description().unwrap();
    assert_eq!(net.node_names(), vec!["x", "a", "b", "out"]);
}

#[test]
fn recurrent_loop_through_delay() {
    let mut b = builder(
        "[
            x = Input(2)
            h = Sigmoid(x + prev)
            prev = Delay(h, 1)
            out = h
        ]",
    );
    let net = b.build_network_from_description().unwrap();
    assert_eq!(net.node_names(), vec!["x", "h", "prev", "Plus#1"]);
    assert_eq!(b.stats().finalized, 1);

    let prev = net.node("prev").unwrap();
    assert_eq!(prev.kind(), NodeKind::Delay);
    assert!(Rc::ptr_eq(&prev.children().unwrap()[0], net.node("h").unwrap()));
    match prev.detail() {
        NodeDetail::Delay(state) => assert_eq!(state.delta_t(), -1),
        _ => panic!("prev is not a delay node"),
    }
}

#[test]
fn delay_shared_with_a_nested_network() {
    let mut b = builder(
        "[
            x = Input(2)
            h = Sigmoid(x + prev)
            prev = Delay(h, 1)
            sub = new ComputationNetwork [ o = h ]
            out = h
        ]",
    );
    let net = b.build_network_from_description().unwrap();
    assert_eq!(net.node_names(), vec!["x", "h", "prev", "Plus#1"]);
    assert_eq!(b.stats().finalized, 1);

    // The nested network is gone with the evaluator; the outer edges survive it.
    let prev = net.node("prev").unwrap();
    assert!(Rc::ptr_eq(&prev.children().unwrap()[0], net.node("h").unwrap()));
    assert_eq!(net.node("Plus#1").unwrap().input_names(), vec!["x", "prev"]);
}

#[test]
fn delay_input_constructed_while_finalizing() {
    let mut b = builder("[ x = Input(2) ; d = Delay(Tanh(x), 1) ]");
    let net = b.build_network_from_description().unwrap();
    assert_eq!(net.node_names(), vec!["x", "d", "Tanh#1"]);

    let tanh = net.node("Tanh#1").unwrap();
    assert_eq!(tanh.kind(), NodeKind::Tanh);
    assert!(Rc::ptr_eq(&net.node("d").unwrap().children().unwrap()[0], tanh));
    let stats = b.stats();
    assert_eq!(stats.finalized, 1);
    // x, d, Tanh#1 and the network itself.
    assert_eq!(stats.constructed, 4);
}

#[test]
fn tags_route_nodes_into_groups() {
    let mut b = builder(
        "[
            f = Feature(2)
            l = Label(2)
            p = Parameter(2, 2)
            z = Times(p, f, tag = 'output')
            ce = CrossEntropyWithSoftmax(l, z)
            acc = ErrorPrediction(l, z, tag = 'evalAccuracy')
            legacy = SquareError(l, z, tag = 'criteria')
        ]",
    );
    let net = b.build_network_from_description().unwrap();
    let groups = net.groups();
    assert_eq!(groups.names(RoleGroup::Feature), vec!["f"]);
    assert_eq!(groups.names(RoleGroup::Label), vec!["l"]);
    assert_eq!(groups.names(RoleGroup::Criterion), vec!["ce", "legacy"]);
    assert_eq!(groups.names(RoleGroup::Evaluation), vec!["acc"]);
    assert_eq!(groups.names(RoleGroup::Output), vec!["z"]);
    assert!(groups.get(RoleGroup::Pair).is_empty());
    assert_eq!(net.node("p").unwrap().tag(), "");
}

#[test]
fn unknown_tags_fail_the_build() {
    let err = builder("[ x = Input(2, tag = 'bogus') ]")
        .build_network_from_description()
        .unwrap_err();
    assert_eq!(err, Error::construction("node 'x' has unknown tag 'bogus'"));
}

#[test]
fn precision_selects_the_element_type() {
    let source = "[ x = Input(2) ; y = Exp(x) ]";
    let (float, _) = build(source, &BuildOptions::default()).unwrap();
    assert!(matches!(float, BuiltNetwork::Float(_)));

    let options = BuildOptions {
        precision: Precision::Double,
        ..BuildOptions::default()
    };
    let (double, _) = build(source, &options).unwrap();
    match &double {
        BuiltNetwork::Double(net) => assert_eq!(net.node_names(), vec!["x", "y"]),
        BuiltNetwork::Float(_) => panic!("expected a double network"),
    }

    assert!(matches!("int8".parse::<Precision>(), Err(Error::Construction(_))));
    let err = builder("[ precision = 'int8' ; x = Input(2) ]")
        .build_network_from_description()
        .unwrap_err();
    assert_eq!(
        err,
        Error::construction("invalid value 'int8' for 'precision', must be 'float' or 'double'")
    );
}

#[test]
fn local_precision_override_is_a_mismatch() {
    let err = builder(
        "[ precision = 'double' ; x = new ComputationNode [ operation = 'Input' ; rows = 2 ; cols = 1 ] ]",
    )
    .build_network_from_description()
    .unwrap_err();
    assert_eq!(
        err,
        Error::PrecisionMismatch {
            requested: "float".into(),
            actual: "double".into(),
        }
    );
}

#[test]
fn random_seeds_are_unique_and_offset() {
    let options = BuildOptions {
        random_seed_offset: 100,
        ..BuildOptions::default()
    };
    let mut b = NetworkBuilder::<f32>::new(
        "[ a = Parameter(2, 2) ; b = Parameter(2, 2, init = 'gaussian', initValueScale = 0.5) ; c = a + b ]",
        options,
    );
    let net = b.build_network_from_description().unwrap();
    let seed = |name: &str| match net.node(name).unwrap().detail() {
        NodeDetail::Parameter { init: ParameterInit::Uniform { seed, .. }, .. }
        | NodeDetail::Parameter { init: ParameterInit::Gaussian { seed, .. }, .. } => *seed,
        _ => panic!("{} is not randomized", name),
    };
    assert_eq!((seed("a"), seed("b")), (101, 102));
    assert_eq!(b.stats().randomized, 2);
}

#[test]
fn largest_seed_offset_wraps() {
    let options: BuildOptions =
        serde_json::from_str(r#"{"randomSeedOffset": 18446744073709551615}"#).unwrap();
    let mut b = NetworkBuilder::<f32>::new("[ w = Parameter(2, 2) ]", options);
    let net = b.build_network_from_description().unwrap();
    match net.node("w").unwrap().detail() {
        NodeDetail::Parameter { init: ParameterInit::Uniform { seed, .. }, .. } => {
            assert_eq!(*seed, 0)
        }
        _ => panic!("w is not uniformly initialized"),
    }
}

#[test]
fn layer_macros_name_their_nodes_by_path() {
    let mut b = builder(
        "[
            x = Feature(4)
            L1 = SBFF(x, 3, 4)
            out = Softmax(L1.Eh, tag = 'output')
            norm = MeanVarNorm(x)
        ]",
    );
    let net = b.build_network_from_description().unwrap();
    for name in ["x", "L1.B.W", "L1.B.B", "L1.B.z", "L1.Eh", "out", "norm"] {
        assert!(net.node(name).is_some(), "missing {} in {:?}", name, net.node_names());
    }
    assert_eq!(net.len(), 10);
    assert_eq!(net.node("L1.B.W").unwrap().shape(), Some((3, 4)));
    assert_eq!(
        net.node("norm").unwrap().kind(),
        NodeKind::PerDimMeanVarNormalization
    );
    assert_eq!(net.group(RoleGroup::Output).len(), 1);
}

#[test]
fn evaluation_errors_surface() {
    let err = builder("[ y = Sigmoid(nothing) ]")
        .build_network_from_description()
        .unwrap_err();
    assert_eq!(err, Error::eval("unknown identifier 'nothing'"));

    let err = builder("[ x = Input(2) ; y = Plus(x) ]")
        .build_network_from_description()
        .unwrap_err();
    assert_eq!(err, Error::eval("missing argument 'b' in call to 'Plus'"));

    let err = builder("[ x = Input(2) ; y = Sigmoid(x : x) ]")
        .build_network_from_description()
        .unwrap_err();
    assert!(matches!(err, Error::Construction(_)), "{}", err);

    let err = builder("[ x = Input(-2) ]")
        .build_network_from_description()
        .unwrap_err();
    assert!(matches!(err, Error::ConfigField { .. }), "{}", err);
}

#[test]
fn syntax_errors_are_reported_with_positions() {
    let err = build("[ x = ]", &BuildOptions::default()).unwrap_err();
    assert_eq!(
        err,
        Error::Syntax {
            line: 1,
            column: 7,
            message: "expected an expression, found ']'".into(),
        }
    );
}
