//! The voice agent: prompt assembly and LLM delegation.

use outdial_providers::LlmClient;
use outdial_types::ChatTurn;

/// Appended to the system prompt when asking for an opening line. Voice
/// greetings have to land inside the first second or two of the call.
const GREETING_CONSTRAINT: &str =
    "\n\nIMPORTANT: Generate ONLY a brief 1-sentence greeting. Maximum 15 words.";

/// Appended to the system prompt for every in-conversation turn.
const VOICE_BREVITY_CONSTRAINT: &str = "\n\n**CRITICAL FOR VOICE: Respond in MAXIMUM 2 short \
sentences (under 30 words total). No bullet points. No lists. Natural speech only.**";

const GREETING_REQUEST: &str = "Start the conversation with a brief greeting.";

/// Default persona shipped with the platform: an appointment setter for a
/// fictional home-services business. Used when an agent is created without a
/// custom prompt.
pub const DEFAULT_APPOINTMENT_SETTER_PROMPT: &str = r#"
You are Alex, a friendly and professional AI voice assistant for "QuickFix Services".
Your goal is to book a service appointment for the user.

CRITICAL RULES FOR VOICE CHAT:
- MAXIMUM 1-2 short sentences per response (under 25 words total)
- NO bullet points, NO lists, NO long explanations
- Ask ONE simple question at a time
- Use natural, conversational speech - like a real phone call
- Get straight to the point - no rambling
- Your primary goal is to book an appointment quickly
- First, confirm they are the right person and have time to talk
- Then, explain you're calling to schedule their service
- Offer 2 specific time slots (e.g., "Tuesday at 10 AM or Thursday at 2 PM")
- If they agree, confirm briefly and end the call
- If they ask a complex question, say "I'll have someone call you back about that"
"#;

/// A conversational persona bound to one LLM client.
///
/// Holds no conversation state of its own; callers pass history explicitly
/// so one agent can serve many concurrent sessions.
#[derive(Debug, Clone)]
pub struct VoiceAgent {
    system_prompt: String,
    llm: LlmClient,
}

impl VoiceAgent {
    pub fn new(system_prompt: impl Into<String>, llm: LlmClient) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            llm,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Asks the LLM for the call-opening greeting. Returns raw model text
    /// (or the adapter's fallback sentence on vendor failure).
    pub async fn initial_greeting(&self) -> String {
        let turns = greeting_turns(&self.system_prompt);
        self.llm.complete(&turns).await
    }

    /// Produces the next assistant turn for `user_input` given the session's
    /// history. No retry here; transient LLM failure is absorbed by the
    /// adapter as a fallback sentence.
    pub async fn respond(&self, user_input: &str, history: &[ChatTurn]) -> String {
        let turns = conversation_turns(&self.system_prompt, history, user_input);
        self.llm.complete(&turns).await
    }
}

fn greeting_turns(system_prompt: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(format!("{system_prompt}{GREETING_CONSTRAINT}")),
        ChatTurn::user(GREETING_REQUEST),
    ]
}

fn conversation_turns(system_prompt: &str, history: &[ChatTurn], user_input: &str) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(ChatTurn::system(format!(
        "{system_prompt}{VOICE_BREVITY_CONSTRAINT}"
    )));
    turns.extend_from_slice(history);
    turns.push(ChatTurn::user(user_input));
    turns
}
