//! Exam-item generation: one web-grounded LLM call that must answer with a
//! fenced JSON object describing a five-alternative question.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::fenced::{excerpt, locate_json_fence, narrow_to_delimiters};
use crate::llm_client::prompts::FENCED_JSON_INSTRUCTION;
use crate::llm_client::{GenerationRequest, Generator};
use crate::question::prompts::{
    DEFAULT_DIFFICULTY, NOT_PROVIDED, NOT_PROVIDED_CHOOSE, QUESTION_PROMPT_TEMPLATE,
};

/// Gemini's default sampling temperature; item writing benefits from variety.
const QUESTION_TEMPERATURE: f32 = 1.0;
const ALTERNATIVE_LETTERS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Authoring parameters. Accepts the legacy Portuguese field names as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionParameters {
    #[serde(default, alias = "Area_do_Conhecimento")]
    pub knowledge_area: Option<String>,
    #[serde(default, alias = "Componente_Curricular")]
    pub curricular_component: Option<String>,
    #[serde(default, alias = "Objeto_do_Conhecimento")]
    pub knowledge_object: Option<String>,
    #[serde(default, alias = "Competencia")]
    pub competency: Option<String>,
    #[serde(default, alias = "Habilidade")]
    pub skill: Option<String>,
    #[serde(default, alias = "Etapa_de_Ensino")]
    pub teaching_stage: Option<String>,
    #[serde(default, alias = "Dificuldade_do_Item")]
    pub difficulty: Option<String>,
    #[serde(default, alias = "Tematica_e_Contexto")]
    pub theme_and_context: Option<String>,
}

/// The generated item as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(alias = "Componente_Curricular")]
    pub curricular_component: String,
    #[serde(alias = "Competencia_Habilidade")]
    pub competency_skill: String,
    #[serde(alias = "Suporte")]
    pub support: String,
    #[serde(alias = "Enunciado")]
    pub statement: String,
    #[serde(alias = "Comando")]
    pub command: String,
    #[serde(alias = "Alternativas")]
    pub alternatives: BTreeMap<String, String>,
    #[serde(alias = "Gabarito")]
    pub answer_key: String,
    #[serde(alias = "Justificativa_Comentada")]
    pub commented_justification: String,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl QuestionParameters {
    /// Returns the two required values, or a validation error naming the missing ones.
    fn required(&self) -> Result<(&str, &str), AppError> {
        match (given(&self.curricular_component), given(&self.knowledge_object)) {
            (Some(component), Some(object)) => Ok((component, object)),
            _ => Err(AppError::Validation(
                "required parameters (curricularComponent, knowledgeObject) were not provided"
                    .to_string(),
            )),
        }
    }
}

pub fn build_question_prompt(params: &QuestionParameters) -> Result<String, AppError> {
    let (component, object) = params.required()?;

    Ok(QUESTION_PROMPT_TEMPLATE
        .replace("{knowledge_area}", given(&params.knowledge_area).unwrap_or(NOT_PROVIDED))
        .replace("{curricular_component}", component)
        .replace("{knowledge_object}", object)
        .replace("{competency}", given(&params.competency).unwrap_or(NOT_PROVIDED_CHOOSE))
        .replace("{skill}", given(&params.skill).unwrap_or(NOT_PROVIDED_CHOOSE))
        .replace("{teaching_stage}", given(&params.teaching_stage).unwrap_or(NOT_PROVIDED))
        .replace("{difficulty}", given(&params.difficulty).unwrap_or(DEFAULT_DIFFICULTY))
        .replace(
            "{theme_and_context}",
            given(&params.theme_and_context).unwrap_or(NOT_PROVIDED),
        )
        .replace("{fenced_json_instruction}", FENCED_JSON_INSTRUCTION))
}

/// Pulls the question object out of the model reply and checks it is complete.
pub fn parse_question_reply(text: &str) -> Result<GeneratedQuestion, AppError> {
    let unusable = |reason: &str| {
        AppError::UnusableReply(format!("{reason}. Reply excerpt: {}", excerpt(text, 300)))
    };

    let block = locate_json_fence(text)
        .ok_or_else(|| unusable("the model did not return a ```json block; try generating again"))?;
    let payload = narrow_to_delimiters(block.body, '{', '}')
        .ok_or_else(|| unusable("the ```json block holds no object"))?;
    let mut question: GeneratedQuestion = serde_json::from_str(payload)
        .map_err(|e| unusable(&format!("the question JSON is invalid ({e})")))?;

    question.answer_key = question.answer_key.trim().to_ascii_uppercase();

    let missing: Vec<&str> = ALTERNATIVE_LETTERS
        .into_iter()
        .filter(|letter| !question.alternatives.contains_key(*letter))
        .collect();
    if !missing.is_empty() {
        return Err(unusable(&format!(
            "the question lacks alternatives {}",
            missing.join(", ")
        )));
    }
    if !ALTERNATIVE_LETTERS.contains(&question.answer_key.as_str()) {
        return Err(unusable(&format!(
            "the answer key {:?} is not one of A to E",
            question.answer_key
        )));
    }

    Ok(question)
}

/// Generates one exam item from the given parameters.
pub async fn generate_question(
    llm: &dyn Generator,
    model: &str,
    params: &QuestionParameters,
) -> Result<GeneratedQuestion, AppError> {
    let prompt = build_question_prompt(params)?;
    let request = GenerationRequest::text(model, prompt, QUESTION_TEMPERATURE).with_web_search();

    info!(
        "Generating question for {:?} / {:?}",
        params.curricular_component, params.knowledge_object
    );
    let reply = llm.generate(&request).await?;
    parse_question_reply(&reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::fake::FakeGenerator;

    const GOOD_REPLY: &str = r#"Here is the item.
```json
{
  "Componente_Curricular": "Mathematics",
  "Competencia_Habilidade": "C1 / H3",
  "Suporte": "A table of rainfall in Fortaleza.",
  "Enunciado": "A farmer tracks rainfall...",
  "Comando": "What is the mean rainfall?",
  "Alternativas": {"A": "10", "B": "12", "C": "14", "D": "16", "E": "18"},
  "Gabarito": "c",
  "Justificativa_Comentada": "C is the arithmetic mean; the others add or drop a month."
}
```"#;

    fn params() -> QuestionParameters {
        QuestionParameters {
            curricular_component: Some("Mathematics".to_string()),
            knowledge_object: Some("Arithmetic mean".to_string()),
            theme_and_context: Some("Rainfall in the semi-arid".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parameters_accept_legacy_names() {
        let params: QuestionParameters = serde_json::from_value(serde_json::json!({
            "Componente_Curricular": "Biologia",
            "Objeto_do_Conhecimento": "Ecologia",
            "Competencia": ""
        }))
        .unwrap();
        assert_eq!(params.curricular_component.as_deref(), Some("Biologia"));
        let prompt = build_question_prompt(&params).unwrap();
        assert!(prompt.contains("Knowledge object (required): Ecologia"));
        assert!(prompt.contains(&format!("Competency: {NOT_PROVIDED_CHOOSE}")));
    }

    #[test]
    fn test_missing_required_parameters_fail_validation() {
        let params = QuestionParameters {
            curricular_component: Some("  ".to_string()),
            knowledge_object: Some("Ecology".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_question_prompt(&params),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_parses_legacy_reply_and_normalises_answer_key() {
        let question = parse_question_reply(GOOD_REPLY).unwrap();
        assert_eq!(question.curricular_component, "Mathematics");
        assert_eq!(question.answer_key, "C");
        assert_eq!(question.alternatives.len(), 5);
    }

    #[test]
    fn test_reply_without_block_is_unusable() {
        let err = parse_question_reply("{\"support\": \"no fence\"}").unwrap_err();
        assert!(matches!(err, AppError::UnusableReply(_)));
    }

    #[test]
    fn test_reply_missing_alternative_is_unusable() {
        let reply = GOOD_REPLY.replace(r#", "E": "18""#, "");
        let err = parse_question_reply(&reply).unwrap_err();
        assert!(err.to_string().contains("lacks alternatives E"), "{err}");
    }

    #[tokio::test]
    async fn test_generation_enables_web_search() {
        let fake = FakeGenerator::replying(GOOD_REPLY);
        let question = generate_question(&fake, "gemini-2.5-flash", &params())
            .await
            .unwrap();
        assert_eq!(question.answer_key, "C");

        let requests = fake.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].web_search);
        assert!(requests[0].prompt.contains("Rainfall in the semi-arid"));
    }

    #[tokio::test]
    async fn test_validation_failure_skips_generation() {
        let fake = FakeGenerator::replying(GOOD_REPLY);
        let result = generate_question(&fake, "gemini-2.5-flash", &QuestionParameters::default()).await;
        assert!(result.is_err());
        assert_eq!(fake.calls(), 0);
    }
}
