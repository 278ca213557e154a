mod common;

use agentflow_core::{Flow, FlowError, MessageKind, SequentialFlow};
use common::{input_for, payload, AddBiasFlow, ScriptedFlow};
use serde_json::json;

fn add_bias_parent(output_interface: serde_json::Value) -> SequentialFlow {
    SequentialFlow::instantiate_with_overrides(json!({
                                                   "name": "seq",
                                                   "description": "two add-bias flows in sequence",
                                                   "output_interface": output_interface,
                                                   "clear_flow_namespace_on_run_end": false,
                                               }),
                                               vec![("first".to_string(), Box::new(AddBiasFlow::new("first", 2)) as Box<dyn Flow>),
                                                    ("second".to_string(), Box::new(AddBiasFlow::new("second", 4)) as Box<dyn Flow>)])
        .unwrap()
}

#[test]
fn two_biases_compose_to_sixteen() {
    let mut parent = add_bias_parent(json!(["v0"]));
    let input = input_for(&parent, "Launcher", payload(&[("v0", json!(10))]));

    let answer = parent.execute(&input).unwrap();

    match &answer.kind {
        MessageKind::Output { output_data, input_message_id, .. } => {
            assert_eq!(output_data["v0"], json!(16));
            assert_eq!(*input_message_id, input.id);
        }
        other => panic!("expected an output message, got {:?}", other),
    }

    // el estado final del padre conserva el resultado
    assert_eq!(parent.kernel().state.get("v0"), Some(&json!(16)));

    // dos outputs de hijos y dos updates de fusión en el history del padre
    let messages = parent.kernel().history.messages();
    assert_eq!(messages.iter().filter(|m| m.is_output()).count(), 2);
    assert_eq!(messages.iter().filter(|m| m.is_state_update()).count(), 2);
}

#[test]
fn children_run_in_declaration_order() {
    let mut parent = add_bias_parent(json!(["v0"]));
    let input = input_for(&parent, "Launcher", payload(&[("v0", json!(10))]));
    parent.execute(&input).unwrap();

    let order: Vec<String> = parent.kernel()
                                   .history
                                   .messages()
                                   .iter()
                                   .filter(|m| m.is_output())
                                   .map(|m| m.created_by.clone())
                                   .collect();
    assert_eq!(order, vec!["first".to_string(), "second".to_string()]);

    // bias 2 primero: 10 + 2 = 12 antes del segundo hijo
    let first_update = parent.kernel()
                             .history
                             .messages()
                             .iter()
                             .find(|m| m.is_state_update())
                             .cloned()
                             .unwrap();
    match first_update.kind {
        MessageKind::StateUpdate { data, .. } => assert_eq!(data["v0"], json!(12)),
        other => panic!("expected a state update, got {:?}", other),
    }
}

#[test]
fn truthy_early_exit_key_skips_remaining_children() {
    let stopper = ScriptedFlow::new("stopper", vec![payload(&[("v0", json!(12)), ("early_exit", json!(true))])], &[]);
    let follower = ScriptedFlow::new("follower", vec![payload(&[("v0", json!(99))])], &[]);
    let follower_calls = follower.calls();

    let mut parent = SequentialFlow::instantiate_with_overrides(json!({
                                                                    "name": "seq",
                                                                    "description": "stops early",
                                                                    "early_exit_key": "early_exit",
                                                                    "output_interface": ["v0"],
                                                                    "clear_flow_namespace_on_run_end": false,
                                                                }),
                                                                vec![("stopper".to_string(), Box::new(stopper) as Box<dyn Flow>),
                                                                     ("follower".to_string(), Box::new(follower) as Box<dyn Flow>)])
        .unwrap();

    let input = input_for(&parent, "Launcher", payload(&[("v0", json!(10))]));
    let answer = parent.execute(&input).unwrap();

    assert_eq!(follower_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    match &answer.kind {
        MessageKind::Output { output_data, .. } => assert_eq!(output_data["v0"], json!(12)),
        other => panic!("expected an output message, got {:?}", other),
    }
    assert_eq!(parent.kernel().history.messages().iter().filter(|m| m.is_output()).count(), 1);
}

#[test]
fn missing_expected_output_key_fails() {
    let mut parent = add_bias_parent(json!(["missing"]));
    let input = input_for(&parent, "Launcher", payload(&[("v0", json!(10))]));

    let err = parent.execute(&input).unwrap_err();
    assert!(matches!(err, FlowError::StateKeyMissing(key) if key == "missing"));
}

#[test]
fn missing_child_input_key_fails() {
    let mut parent = SequentialFlow::instantiate_with_overrides(json!({
                                                                    "name": "seq",
                                                                    "description": "child wants a key nobody provides",
                                                                }),
                                                                vec![("only".to_string(), Box::new(AddBiasFlow::new("only", 1)) as Box<dyn Flow>)])
        .unwrap();

    let input = input_for(&parent, "Launcher", payload(&[("other", json!(1))]));
    let err = parent.execute(&input).unwrap_err();
    assert!(matches!(err, FlowError::StateKeyMissing(key) if key == "v0"));
}

#[test]
fn zero_children_is_an_invalid_topology() {
    let err = SequentialFlow::instantiate_with_overrides(json!({"name": "seq", "description": "empty"}), vec![]).unwrap_err();
    assert!(matches!(err, FlowError::InvalidTopology(_)));
}

#[test]
fn message_ids_chain_through_the_composition() {
    let mut parent = add_bias_parent(json!(["v0"]));
    let input = input_for(&parent, "Launcher", payload(&[("v0", json!(10))]));
    parent.execute(&input).unwrap();

    let messages = parent.kernel().history.messages();
    let first_output_id = messages.iter().find(|m| m.is_output()).map(|m| m.id).unwrap();

    // el input del segundo hijo apunta al output del primero
    let second_child_input_parents: Vec<_> = messages.iter()
                                                     .filter_map(|m| match &m.kind {
                                                         MessageKind::Output { history, .. } if m.created_by == "second" => {
                                                             history.messages().iter().find_map(|inner| match &inner.kind {
                                                                 MessageKind::Input { parent_ids, .. } => Some(parent_ids.clone()),
                                                                 _ => None,
                                                             })
                                                         }
                                                         _ => None,
                                                     })
                                                     .flatten()
                                                     .collect();
    assert_eq!(second_child_input_parents, vec![first_output_id]);
}
