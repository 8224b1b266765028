//! End-to-end exercises of the question/answer boundary over a scripted
//! platform.

use insights_agent::{
    AgentConfig, InsightApp, Message, ModelCompletion, Role, StubChatModel, StubDomainTool,
    StubPlatform, ToolCall, MANAGED_LLM_KIND, NOT_INITIALIZED,
};

fn call(name: &str, query: &str) -> ToolCall {
    ToolCall {
        id: None,
        name: name.into(),
        arguments: serde_json::json!({"query": query}),
    }
}

fn platform(script: Vec<ModelCompletion>) -> StubPlatform {
    StubPlatform::new()
        .with_model(
            "llm-cortex",
            "claude-3-5-sonnet",
            MANAGED_LLM_KIND,
            StubChatModel::new(script),
        )
        .with_tool(
            "t-search",
            "Snowflake Cortex Search",
            StubDomainTool::new("the crowd held its breath through the tiebreak"),
        )
        .with_tool(
            "t-analyst",
            "Snowflake Cortex Analyst",
            StubDomainTool::new("winner saved 7 of 9 break points"),
        )
}

#[tokio::test]
async fn narrative_question_flows_through_search_to_an_answer() {
    let app = InsightApp::new(
        platform(vec![
            ModelCompletion::tool_requests(vec![call(
                "cortex_search_tool",
                "final set emotional arc",
            )]),
            ModelCompletion::text("The final set built slowly toward a breathless tiebreak."),
        ]),
        AgentConfig::default(),
    );

    let answer = app
        .answer("How did the final set unfold emotionally?", Vec::new())
        .await
        .expect("an update");

    assert_eq!(answer.status, "");
    assert_eq!(
        answer.text,
        "The final set built slowly toward a breathless tiebreak."
    );

    let roles: Vec<Role> = answer.history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant, // tool-call request turn
            Role::Tool,
            Role::Assistant,
        ]
    );
    assert!(answer.history[3]
        .content
        .starts_with("[Using Cortex Search tool]\n\n"));
}

#[tokio::test]
async fn combined_question_runs_both_tools_in_order() {
    let app = InsightApp::new(
        platform(vec![
            ModelCompletion::tool_requests(vec![
                call("cortex_search_tool", "mood of the match"),
                call("cortex_analyst_tool", "break point stats"),
            ]),
            ModelCompletion::text("A tense match, and the numbers agree."),
        ]),
        AgentConfig::default(),
    );

    let answer = app
        .answer("Describe the mood and the break point numbers", Vec::new())
        .await
        .unwrap();

    let tool_turns: Vec<&Message> = answer
        .history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_turns.len(), 2);
    assert!(tool_turns[0].content.contains("Cortex Search"));
    assert!(tool_turns[1].content.contains("Cortex Analyst"));
}

#[tokio::test]
async fn transcript_round_trips_across_exchanges() {
    let app = InsightApp::new(
        platform(vec![ModelCompletion::text("First answer.")]),
        AgentConfig::default(),
    );

    let first = app.answer("first question", Vec::new()).await.unwrap();

    // The UI collaborator serializes the history between exchanges.
    let wire = serde_json::to_string(&first.history).unwrap();
    let restored: Vec<Message> = serde_json::from_str(&wire).unwrap();
    assert_eq!(restored, first.history);

    let again = app.answer("second question", restored).await.unwrap();
    assert!(again.text.starts_with("Error: "), "script exhausted");
    assert!(again.history.len() > first.history.len());
}

#[tokio::test]
async fn capped_history_never_grows_past_the_limit() {
    let app = InsightApp::new(
        platform(vec![
            ModelCompletion::tool_requests(vec![call("cortex_search_tool", "q")]),
            ModelCompletion::text("done"),
        ]),
        AgentConfig::default(),
    );

    let history: Vec<Message> = (0..20)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("q{i}"))
            } else {
                Message::assistant(format!("a{i}"))
            }
        })
        .collect();

    let answer = app.answer("one more question", history).await.unwrap();

    assert!(answer.history.len() <= 20);
    assert_eq!(answer.history.last().unwrap().content, "done");
}

#[tokio::test]
async fn unconfigured_platform_reports_the_disabled_agent() {
    let app = InsightApp::new(StubPlatform::new(), AgentConfig::default());

    let answer = app.answer("any question", Vec::new()).await.unwrap();

    assert_eq!(answer.text, NOT_INITIALIZED);
    assert_eq!(answer.history.len(), 1);
}
