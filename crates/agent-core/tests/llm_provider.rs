use action_locator::CommandExecutor;
use agent_core::{
    ActionModel, AgentError, ChangeRequest, MockActionModel, MockSessionBackend, PromptContext, SessionBackend,
};
use serde_json::{json, Map, Value};
use tokio_test::block_on;

fn empty_prompt() -> PromptContext {
    PromptContext {
        system_instruction: "objective".to_string(),
        turns: Vec::new(),
        current: Vec::new(),
    }
}

#[test]
fn mock_model_serves_script_then_reports_done() {
    let model = MockActionModel::new()
        .call("Open the menu", "move_mouse", json!({"x": 10, "y": 20}))
        .error(AgentError::model("rate limited"));

    let first = block_on(model.next_action(&empty_prompt(), 0.3)).expect("scripted reply");
    assert_eq!(first.call.expect("call").name, "move_mouse");

    let second = block_on(model.next_action(&empty_prompt(), 0.4));
    assert_eq!(second, Err(AgentError::model("rate limited")));

    let third = block_on(model.next_action(&empty_prompt(), 0.5)).expect("exhausted reply");
    assert_eq!(third.call.expect("call").name, "report_done");
    assert_eq!(model.temperatures(), vec![0.3, 0.4, 0.5]);
    assert_eq!(model.prompts().len(), 3);
}

#[test]
fn mock_model_change_descriptions() {
    let model = MockActionModel::new().change("OBSERVED: A dialog opened. INTENT ALIGNMENT: Aligned.");
    let request = ChangeRequest {
        before: vec![1],
        after: vec![2],
        last_command: "click()".to_string(),
        intent: "open the dialog".to_string(),
    };
    let first = block_on(model.describe_changes(&request)).expect("change");
    assert!(first.contains("A dialog opened"));
    let second = block_on(model.describe_changes(&request)).expect("default change");
    assert!(second.contains("not aligned"));
}

#[test]
fn mock_backend_validates_and_records_commands() {
    let backend = MockSessionBackend::new(vec![7]).screenshots(vec![vec![1], vec![2]]);
    assert_eq!(block_on(backend.fetch_screenshot(0)).expect("shot"), vec![1]);
    assert_eq!(block_on(backend.fetch_screenshot(1)).expect("shot"), vec![2]);
    assert_eq!(block_on(backend.fetch_screenshot(2)).expect("shot"), vec![7]);
    assert!(block_on(backend.fetch_dom_elements(0)).expect("dom").is_none());

    let mut args = Map::new();
    args.insert("x".to_string(), Value::from(3));
    let ack = block_on(backend.execute("scroll_wheel_down", &args)).expect("ack");
    assert_eq!(ack.command, vec![json!(":scroll-wheel-down"), json!(3)]);
    assert!(block_on(backend.execute("navigate", &Map::new())).is_err());
    assert_eq!(backend.commands().len(), 2);
}

#[test]
fn failing_backend_rejects_commands() {
    let backend = MockSessionBackend::new(vec![1]).failing_commands();
    let err = block_on(backend.execute("click", &Map::new())).unwrap_err();
    assert!(err.to_string().contains("click"));
    assert!(backend.commands().is_empty());
}
