//! Prompt composition.
//!
//! A [`ModelRequest`] is assembled from four parts in a fixed order:
//! persona directive, task instructions, retrieved context, user query.
//! Empty parts are dropped and the rest are joined with a blank line.
//! No truncation happens here; backends enforce their own input limits.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Tone directive prefixed to every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Professional,
    Technical,
    Casual,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Professional, Persona::Technical, Persona::Casual];

    pub fn directive(&self) -> &'static str {
        match self {
            Persona::Professional => "Respond in a formal, professional tone.",
            Persona::Technical => "Respond in a highly technical manner with detailed explanations.",
            Persona::Casual => "Respond in a casual, friendly tone.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Professional => "professional",
            Persona::Technical => "technical",
            Persona::Casual => "casual",
        }
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "professional" => Ok(Persona::Professional),
            "technical" => Ok(Persona::Technical),
            "casual" => Ok(Persona::Casual),
            other => Err(format!(
                "unknown persona '{}'. Use professional, technical, or casual.",
                other
            )),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The task a prompt asks the model to perform.
///
/// Each task carries its instruction template and the label the user's
/// input is framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Summarize,
    Sentiment,
    Entities,
    CodeGeneration,
    QuestionAnswering,
    DocumentQa,
}

impl Task {
    pub fn instructions(&self) -> &'static str {
        match self {
            Task::Summarize => {
                "You are an advanced AI assistant skilled in document summarization. \
Your task is to provide a concise, yet informative summary of the provided content. \
The summary should:
- Highlight the main points and key information.
- Be clear, structured, and well-organized.
- Be in a format that is easy to read and understand.

Focus on the core ideas and present them in a structured manner without unnecessary repetition."
            }
            Task::Sentiment => {
                "You are a sentiment analysis expert. Your task is to analyze the following text \
and classify its overall sentiment.

Instructions:
1. Read the provided text carefully.
2. Identify the dominant emotional tone.
3. Classify the sentiment as either positive, negative, or neutral.
4. Provide only the sentiment classification (positive, negative, or neutral) \
without any additional explanation or analysis."
            }
            Task::Entities => {
                "You are an expert in Named Entity Recognition. Your task is to extract all named \
entities from the provided text and present them grouped by entity type.

Instructions:
1. Analyze the provided text to identify all named entities.
2. Group the extracted entities by type (e.g., Dates, Persons, Locations, Organizations).
3. Start each group on its own line with a label followed by a colon (e.g., 'Persons:').
4. Enclose each entity in double quotation marks.
5. Separate the entities of one group with commas on the same line.
6. Omit any entity type with no entities."
            }
            Task::CodeGeneration => {
                "You are a highly skilled Python code generator. Your task is to produce clean, \
efficient, and directly executable Python code based on the user's request.

Instructions:
1. Understand the user's request precisely.
2. Generate the complete Python code to fulfill the request.
3. Provide only the Python code. Do not include any explanations, comments, docstrings, \
or example usage.
4. The code should be self-contained and ready to run."
            }
            Task::QuestionAnswering => {
                "You are a helpful and informative chatbot designed to answer user questions to \
the best of your ability.

Instructions:
1. Read the user's question carefully.
2. Provide a clear, concise, and accurate answer.
3. If you don't know the answer, respond with \"I'm sorry, I don't have the answer to that question.\"
4. Maintain a friendly and helpful tone."
            }
            Task::DocumentQa => "Answer the following question based on the provided context:",
        }
    }

    /// Frame the user's input the way the task's template expects.
    pub fn frame_query(&self, query: &str) -> String {
        match self {
            Task::Summarize => query.to_string(),
            Task::Sentiment => format!("Text: {}\n\nSentiment:", query),
            Task::Entities => format!("Text: {}\n\nEntities:", query),
            Task::CodeGeneration => format!("User Request: {}", query),
            Task::QuestionAnswering => format!("User Question: {}\n\nChatbot Response:", query),
            Task::DocumentQa => format!("Question: {}", query),
        }
    }
}

/// An immutable, fully specified prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRequest {
    pub persona: Option<Persona>,
    pub task: Task,
    pub context: String,
    pub query: String,
}

impl ModelRequest {
    pub fn new(
        persona: Option<Persona>,
        task: Task,
        context: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            persona,
            task,
            context: context.into(),
            query: query.into(),
        }
    }

    /// Render the prompt: persona → instructions → context → query.
    pub fn compose(&self) -> String {
        let framed = self.task.frame_query(&self.query);
        let parts = [
            self.persona.map(|p| p.directive()).unwrap_or_default(),
            self.task.instructions(),
            self.context.as_str(),
            framed.as_str(),
        ];
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_appear_in_fixed_order() {
        let req = ModelRequest::new(
            Some(Persona::Technical),
            Task::DocumentQa,
            "The invoice is due in 30 days.",
            "When is the invoice due?",
        );
        let prompt = req.compose();
        let persona = prompt.find("highly technical").unwrap();
        let instructions = prompt.find("based on the provided context").unwrap();
        let context = prompt.find("due in 30 days").unwrap();
        let query = prompt.find("Question: When is the invoice due?").unwrap();
        assert!(persona < instructions && instructions < context && context < query);
    }

    #[test]
    fn test_no_persona_and_empty_context_are_omitted() {
        let req = ModelRequest::new(None, Task::DocumentQa, "", "What?");
        assert_eq!(
            req.compose(),
            "Answer the following question based on the provided context:\n\nQuestion: What?"
        );
    }

    #[test]
    fn test_long_context_is_not_truncated() {
        let context = "word ".repeat(50_000);
        let req = ModelRequest::new(Some(Persona::Casual), Task::Summarize, context.clone(), "");
        assert!(req.compose().contains(context.trim()));
    }

    #[test]
    fn test_persona_parsing() {
        assert_eq!("Casual".parse::<Persona>().unwrap(), Persona::Casual);
        assert_eq!("TECHNICAL".parse::<Persona>().unwrap(), Persona::Technical);
        assert!("pirate".parse::<Persona>().is_err());
        assert_eq!(Persona::Professional.to_string(), "professional");
    }

    #[test]
    fn test_sentiment_prompt_ends_with_cue() {
        let prompt = ModelRequest::new(None, Task::Sentiment, "", "I love this product").compose();
        assert!(prompt.ends_with("Text: I love this product\n\nSentiment:"));
    }
}
