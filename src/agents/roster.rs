//! The fixed agent team: one orchestrator and three workers.

use crate::thoughts::ROOT_AGENT;

/// Static description of one agent.
#[derive(Debug)]
pub struct AgentSpec {
    pub name: &'static str,
    /// Shown to the parent when it decides whom to transfer to.
    pub description: &'static str,
    pub instruction: &'static str,
    pub tools: &'static [&'static str],
    pub sub_agents: &'static [&'static str],
}

impl AgentSpec {
    pub fn can_transfer_to(&self, name: &str) -> bool {
        self.sub_agents.contains(&name)
    }
}

pub const RESEARCH_AGENT: AgentSpec = AgentSpec {
    name: "research_agent",
    description: "Gathers information from knowledge bases and the web. Use this agent when the \
                  user asks a question that requires looking up information, facts, or current data.",
    instruction: "You are a Research Agent specializing in information gathering.
Your job is to find relevant information using the tools available to you.

When given a query:
1. First search the internal knowledge base for relevant information.
2. If needed, also perform a web search for up-to-date information.
3. Compile and present all findings clearly.

Always cite your sources and indicate confidence levels.",
    tools: &["search_knowledge_base", "web_search"],
    sub_agents: &[],
};

pub const ANALYSIS_AGENT: AgentSpec = AgentSpec {
    name: "analysis_agent",
    description: "Analyzes data, identifies patterns, and provides insights. Use this agent when \
                  the user needs data analysis, comparisons, trend analysis, or statistical calculations.",
    instruction: "You are an Analysis Agent specializing in data processing and insight extraction.
Your job is to analyze information and provide meaningful insights.

When given data or a question requiring analysis:
1. Determine the appropriate analysis type (general, sentiment, trend, comparison).
2. Use the analyze_data tool to process the information.
3. If numeric data is involved, use calculate_metrics for statistical analysis.
4. Present insights clearly with confidence scores.

Always explain your reasoning and methodology.",
    tools: &["analyze_data", "calculate_metrics"],
    sub_agents: &[],
};

pub const SUMMARY_AGENT: AgentSpec = AgentSpec {
    name: "summary_agent",
    description: "Formats information into clear, well-structured reports and extracts key points. \
                  Use this agent when information needs to be organized, summarized, or formatted \
                  for presentation.",
    instruction: "You are a Summary Agent specializing in content organization and report generation.
Your job is to take information and present it in a clear, structured format.

When given content to summarize:
1. Extract the key points from the provided information.
2. Format the content into an appropriate report structure.
3. Ensure the output is clear, concise, and well-organized.

Always maintain accuracy while improving readability.",
    tools: &["format_report", "extract_key_points"],
    sub_agents: &[],
};

pub const ROOT: AgentSpec = AgentSpec {
    name: ROOT_AGENT,
    description: "Main orchestrator that coordinates research, analysis, and summary agents to \
                  provide comprehensive answers.",
    instruction: "You are the Main Orchestrator Agent for Agent Studio, coordinating a team of specialized sub-agents.

Your role is to understand the user's request and delegate to the appropriate sub-agents:

1. **Research Agent** - For gathering information, looking up facts, or finding current data.
2. **Analysis Agent** - For analyzing data, identifying patterns, performing calculations, or comparing options.
3. **Summary Agent** - For organizing, formatting, or summarizing information into clear reports.

Strategy guidelines:
- For simple factual questions: Use the Research Agent.
- For questions requiring analysis: Use Research Agent first, then Analysis Agent.
- For comprehensive requests: Use Research Agent, then Analysis Agent, then Summary Agent in sequence.
- Always synthesize the results from sub-agents into a clear, helpful final response.

**IMPORTANT - Thought Stream Reporting:**
Before delegating to any sub-agent, you MUST use the emit_thought tool to report your reasoning:
- agent_name: \"root_agent\"
- message: a brief description of your plan (e.g. \"Delegating to Research Agent for information gathering\")
- status: \"running\"

After receiving results from sub-agents, emit a completed thought:
- agent_name: \"root_agent\"
- message: a brief summary of what was accomplished
- status: \"completed\"

Be transparent about which agents you're using and why. Provide comprehensive, well-structured answers.",
    tools: &["emit_thought"],
    sub_agents: &["research_agent", "analysis_agent", "summary_agent"],
};

static ROSTER: [&AgentSpec; 4] = [&ROOT, &RESEARCH_AGENT, &ANALYSIS_AGENT, &SUMMARY_AGENT];

/// Look up an agent by name.
pub fn find_agent(name: &str) -> Option<&'static AgentSpec> {
    ROSTER.iter().copied().find(|spec| spec.name == name)
}

/// All agents, root first.
pub fn roster() -> &'static [&'static AgentSpec] {
    &ROSTER
}

/// System prompt for `spec`, including the agents it may transfer to.
pub fn system_prompt(spec: &AgentSpec) -> String {
    let mut prompt = spec.instruction.to_string();
    let children: Vec<&AgentSpec> = spec
        .sub_agents
        .iter()
        .filter_map(|name| find_agent(name))
        .collect();
    if !children.is_empty() {
        prompt.push_str(
            "\n\nYou can hand a request to one of the following agents with the \
             transfer_to_agent tool. The agent's answer is returned as the tool result.\n",
        );
        for child in children {
            prompt.push_str(&format!("\n- `{}`: {}", child.name, child.description));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sub_agent_exists_and_tools_are_registered() {
        let registry = crate::tools::ToolRegistry::new();
        for spec in roster() {
            for child in spec.sub_agents {
                assert!(find_agent(child).is_some(), "{} -> {}", spec.name, child);
            }
            for tool in spec.tools {
                assert!(registry.has_tool(tool), "{} uses {}", spec.name, tool);
            }
        }
    }

    #[test]
    fn only_root_delegates() {
        assert!(ROOT.can_transfer_to("analysis_agent"));
        assert!(!ROOT.can_transfer_to("root_agent"));
        assert!(!RESEARCH_AGENT.can_transfer_to("summary_agent"));
    }

    #[test]
    fn root_prompt_lists_children() {
        let prompt = system_prompt(&ROOT);
        assert!(prompt.starts_with("You are the Main Orchestrator Agent"));
        assert!(prompt.contains("`research_agent`"));
        assert!(prompt.contains("`summary_agent`"));
        assert_eq!(system_prompt(&RESEARCH_AGENT), RESEARCH_AGENT.instruction);
    }
}
