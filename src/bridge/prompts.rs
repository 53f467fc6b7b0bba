//! Prompt text sent to the advisory provider.

use serde_json::Value;

use crate::mcp::ToolDescriptor;

use super::types::InteractionRecord;

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn usage_prompt(tool: &ToolDescriptor, other_tools: &[&str]) -> String {
    format!(
        "Describe how to use the tool below.\n\n\
         Name: {name}\n\
         Description: {description}\n\
         Input schema:\n{schema}\n\n\
         Other available tools: {others}\n\n\
         Respond with a JSON object of the form\n\
         {{\"examples\": [{{\"input\": {{...}}, \"output\": ..., \"description\": \"...\"}}], \
         \"relatedTools\": [\"tool_name\"], \"category\": \"...\"}}\n\
         Only list related tools from the available tools. Respond with JSON only.",
        name = tool.name,
        description = tool.description,
        schema = pretty(&tool.input_schema),
        others = if other_tools.is_empty() {
            "(none)".to_string()
        } else {
            other_tools.join(", ")
        },
    )
}

pub(crate) fn optimize_prompt(
    tool: &ToolDescriptor,
    parameters: &Value,
    user_intent: Option<&str>,
    precedents: &[InteractionRecord],
) -> String {
    let mut prompt = format!(
        "Improve the parameters of a call to the tool '{name}'.\n\n\
         Description: {description}\n\
         Input schema:\n{schema}\n\n\
         Current parameters:\n{parameters}\n",
        name = tool.name,
        description = tool.description,
        schema = pretty(&tool.input_schema),
        parameters = pretty(parameters),
    );
    if let Some(intent) = user_intent {
        prompt.push_str(&format!("\nUser intent: {intent}\n"));
    }
    if !precedents.is_empty() {
        prompt.push_str("\nParameters that worked well before:\n");
        for record in precedents {
            prompt.push_str(&format!(
                "- intent: {} parameters: {}\n",
                record.user_intent, record.tool_call.parameters
            ));
        }
    }
    prompt.push_str(
        "\nRespond with the complete parameter object as JSON only. \
         Return the current parameters unchanged if they need no improvement.",
    );
    prompt
}

pub(crate) fn search_prompt(query: &str, tools: &[&ToolDescriptor], limit: usize) -> String {
    let listing: Vec<Value> = tools
        .iter()
        .map(|tool| serde_json::json!({ "name": tool.name, "description": tool.description }))
        .collect();
    format!(
        "Rank the tools below by relevance to the query \"{query}\".\n\n\
         Tools:\n{tools}\n\n\
         Respond with a JSON array of at most {limit} entries, most relevant first, each \
         {{\"name\": \"tool_name\", \"confidence\": <0.0 to 1.0>}}. Respond with JSON only.",
        tools = pretty(&Value::Array(listing)),
    )
}
