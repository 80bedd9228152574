use std::collections::HashMap;

use crate::core::errors::ApiError;
use crate::llm::types::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A `{name}` placeholder template. `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Result<Self, ApiError> {
        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    let name = name.trim().to_string();
                    if !closed || name.is_empty() || name.contains('{') {
                        return Err(ApiError::Internal(format!(
                            "Malformed prompt template near '{{{}'",
                            name
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !variables.contains(&name) {
                        variables.push(name.clone());
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => {
                    return Err(ApiError::Internal(
                        "Unmatched '}' in prompt template".to_string(),
                    ));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            variables,
        })
    }

    /// Renders the template; every missing variable is named in the error.
    pub fn format(&self, values: &HashMap<&str, &str>) -> Result<String, ApiError> {
        let missing: Vec<&str> = self
            .variables
            .iter()
            .map(String::as_str)
            .filter(|name| !values.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Missing prompt variables: {}",
                missing.join(", ")
            )));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    out.push_str(values.get(name.as_str()).copied().unwrap_or_default())
                }
            }
        }
        Ok(out)
    }
}

/// System prompt, then prior conversation, then the human turn.
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    system: Option<PromptTemplate>,
    human: PromptTemplate,
}

impl ChatPromptTemplate {
    pub fn new(system: Option<&str>, human: &str) -> Result<Self, ApiError> {
        Ok(Self {
            system: system.map(PromptTemplate::new).transpose()?,
            human: PromptTemplate::new(human)?,
        })
    }

    pub fn format_messages(
        &self,
        values: &HashMap<&str, &str>,
        history: &[ChatMessage],
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.format(values)?));
        }
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(self.human.format(values)?));
        Ok(messages)
    }
}

/// Trims the raw model text; the only parser these chains need.
pub struct StrOutputParser;

impl StrOutputParser {
    pub fn parse(&self, raw: &str) -> String {
        raw.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_variables_in_order() {
        let template = PromptTemplate::new("Question:{question} / {question}").unwrap();
        assert_eq!(template.variables, ["question".to_string()]);

        let values = HashMap::from([("question", "why?")]);
        assert_eq!(template.format(&values).unwrap(), "Question:why? / why?");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = PromptTemplate::new("{{\"answer\": \"{text}\"}}").unwrap();
        let values = HashMap::from([("text", "yes")]);
        assert_eq!(template.format(&values).unwrap(), "{\"answer\": \"yes\"}");
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let template = PromptTemplate::new("<context>{context}</context>{input}").unwrap();
        let values = HashMap::from([("input", "q")]);
        let err = template.format(&values).unwrap_err();
        assert!(err.to_string().contains("context"));

        let err = template.format(&HashMap::new()).unwrap_err();
        assert!(err.to_string().ends_with("context, input"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(PromptTemplate::new("{unclosed").is_err());
        assert!(PromptTemplate::new("stray }").is_err());
        assert!(PromptTemplate::new("{}").is_err());
    }

    #[test]
    fn chat_prompt_places_history_between_system_and_human() {
        let prompt = ChatPromptTemplate::new(Some("Be brief. {context}"), "{input}").unwrap();
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let values = HashMap::from([("context", "ctx"), ("input", "next")]);

        let messages = prompt.format_messages(&values, &history).unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::system("Be brief. ctx"));
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3], ChatMessage::user("next"));
    }

    #[test]
    fn output_parser_trims() {
        assert_eq!(StrOutputParser.parse("  answer \n"), "answer");
    }
}
