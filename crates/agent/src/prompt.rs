//! Prompt assembly for a worker's unit of work

use chrono::Local;

use motorcrew_provider::{Message, ToolCallDef};

use crate::context::ExecutionContext;
use crate::worker::{UnitBrief, Worker};

/// System prompt: who the worker is and what it may use
pub fn system_prompt(worker: &Worker) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
    let tools = worker.tools().names();
    let tool_section = if tools.is_empty() {
        "You have no tools. Answer from the material you are given.".to_string()
    } else {
        format!(
            "You may call only these tools: {}.\nCalling any other tool ends your assignment with an error.",
            tools.join(", ")
        )
    };

    format!(
        r#"# {role}

{backstory}

## Goal
{goal}

## Tools
{tools}

## Current Time
{now}

When you have what you need, reply with your final answer as plain text.
Do not ask follow-up questions."#,
        role = worker.role(),
        backstory = worker.backstory(),
        goal = worker.goal(),
        tools = tool_section,
        now = now,
    )
}

/// User prompt: the unit description, its output contract, and prior results
pub fn unit_prompt(brief: &UnitBrief, context: &ExecutionContext) -> String {
    let mut parts = vec![
        format!("# Subject\n\n{}", context.subject()),
        format!("# Assignment\n\n{}", brief.description.trim()),
        format!("# Expected Output\n\n{}", brief.expected_output.trim()),
    ];

    let prior = context.render_for_prompt();
    if !prior.is_empty() {
        parts.push(prior);
    }

    parts.join("\n\n---\n\n")
}

/// Opening messages for a worker's reasoning loop
pub fn build_messages(worker: &Worker, brief: &UnitBrief, context: &ExecutionContext) -> Vec<Message> {
    vec![
        Message::system(system_prompt(worker)),
        Message::user(unit_prompt(brief, context)),
    ]
}

pub fn add_tool_result(messages: &mut Vec<Message>, tool_call_id: &str, name: &str, result: &str) {
    messages.push(Message::tool(tool_call_id, name, result));
}

/// Assistant turn, with the tool calls it requested
pub fn add_assistant_message(
    messages: &mut Vec<Message>,
    content: Option<&str>,
    tool_calls: Option<Vec<ToolCallDef>>,
) {
    let mut msg = Message::assistant(content.unwrap_or(""));
    if let Some(calls) = tool_calls {
        msg.tool_calls = Some(calls);
    }
    messages.push(msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> UnitBrief {
        UnitBrief::new(
            "pricing",
            "Analyze pricing for the Tesla Model 3.",
            "A comprehensive pricing analysis",
        )
    }

    #[test]
    fn test_unit_prompt_without_prior_results() {
        let ctx = ExecutionContext::new("Tesla Model 3");
        let prompt = unit_prompt(&brief(), &ctx);
        assert!(prompt.contains("# Subject\n\nTesla Model 3"));
        assert!(prompt.contains("Analyze pricing for the Tesla Model 3."));
        assert!(prompt.contains("# Expected Output\n\nA comprehensive pricing analysis"));
        assert!(!prompt.contains("Results so far"));
    }

    #[test]
    fn test_unit_prompt_includes_prior_results() {
        let mut ctx = ExecutionContext::new("Tesla Model 3");
        ctx.record("research", "Automobile Research Specialist", "Dual motor AWD")
            .unwrap();
        let prompt = unit_prompt(&brief(), &ctx);
        assert!(prompt.contains("Results so far"));
        assert!(prompt.contains("Dual motor AWD"));
    }

    #[test]
    fn test_message_helpers() {
        let mut messages = Vec::new();
        add_assistant_message(
            &mut messages,
            None,
            Some(vec![ToolCallDef::new("c1", "web_search", serde_json::json!({"query": "q"}))]),
        );
        add_tool_result(&mut messages, "c1", "web_search", "No results for: q");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].tool_calls.as_ref().unwrap().len(), 1);
        assert_eq!(messages[1].role, "tool");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("c1"));
    }
}
