//! Answer-sheet reader: asks the vision model for the mark on each question.
//!
//! Reply contract: a fenced JSON object `{"Q1": "A", ...}` covering exactly
//! Q1..Qn, each value a letter within the option range, `-` (blank) or `X`
//! (multiple marks).

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::answer_sheet::prompts::READ_SHEET_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::fenced::{excerpt, locate_json_fence, narrow_to_delimiters};
use crate::llm_client::prompts::FENCED_JSON_INSTRUCTION;
use crate::llm_client::{GenerationRequest, Generator, InlineImage};

pub const BLANK_MARK: &str = "-";
pub const MULTIPLE_MARK: &str = "X";
const DEFAULT_MIME_TYPE: &str = "image/jpeg";
const OPTION_LETTERS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];
const MAX_QUESTIONS: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSheetRequest {
    #[serde(default)]
    pub base64_image: Option<String>,
    #[serde(default, alias = "numQuestoes")]
    pub question_count: Option<u32>,
    #[serde(default, alias = "numAlternativas")]
    pub option_count: Option<u32>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// A validated read request.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    pub image: InlineImage,
    pub question_count: u32,
    pub option_count: usize,
}

impl ReadSheetRequest {
    pub fn validate(self) -> Result<SheetSpec, AppError> {
        let incomplete = || {
            AppError::Validation(
                "incomplete data: image, number of questions or number of alternatives missing"
                    .to_string(),
            )
        };

        let raw_image = self
            .base64_image
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(incomplete)?;
        let question_count = self
            .question_count
            .filter(|n| *n > 0)
            .ok_or_else(incomplete)?;
        let option_count = self
            .option_count
            .filter(|n| *n > 0)
            .ok_or_else(incomplete)?;

        if question_count > MAX_QUESTIONS {
            return Err(AppError::Validation(format!(
                "at most {MAX_QUESTIONS} questions can be read from one sheet"
            )));
        }
        if option_count as usize > OPTION_LETTERS.len() {
            return Err(AppError::Validation(format!(
                "at most {} alternatives per question are supported",
                OPTION_LETTERS.len()
            )));
        }

        let (data_url_mime, base64_data) = split_data_url(raw_image.trim());
        let mime_type = self
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .or(data_url_mime)
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        Ok(SheetSpec {
            image: InlineImage {
                mime_type,
                base64_data,
            },
            question_count,
            option_count: option_count as usize,
        })
    }
}

/// Accepts both bare base64 and `data:<mime>;base64,<data>` URLs.
fn split_data_url(raw: &str) -> (Option<String>, String) {
    if let Some(rest) = raw.strip_prefix("data:") {
        if let Some((header, data)) = rest.split_once(',') {
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            let mime = (!mime.is_empty()).then(|| mime.to_string());
            return (mime, data.to_string());
        }
    }
    (None, raw.to_string())
}

fn option_letters(option_count: usize) -> &'static [char] {
    &OPTION_LETTERS[..option_count.min(OPTION_LETTERS.len())]
}

pub fn build_read_prompt(spec: &SheetSpec) -> String {
    let letters: Vec<String> = option_letters(spec.option_count)
        .iter()
        .map(char::to_string)
        .collect();

    READ_SHEET_PROMPT_TEMPLATE
        .replace("{question_count}", &spec.question_count.to_string())
        .replace("{option_count}", &spec.option_count.to_string())
        .replace("{option_letters}", &letters.join(", "))
        .replace("{last_question}", &spec.question_count.to_string())
        .replace("{fenced_json_instruction}", FENCED_JSON_INSTRUCTION)
}

/// Validates the model's reading and returns it ordered Q1..Qn.
pub fn parse_sheet_reply(text: &str, spec: &SheetSpec) -> Result<Map<String, Value>, AppError> {
    let unusable = |reason: String| {
        AppError::UnusableReply(format!("{reason}. Reply excerpt: {}", excerpt(text, 300)))
    };

    let block = locate_json_fence(text)
        .ok_or_else(|| unusable("the model did not return the expected ```json block".to_string()))?;
    let payload = narrow_to_delimiters(block.body, '{', '}')
        .ok_or_else(|| unusable("the ```json block holds no object".to_string()))?;
    let raw: Map<String, Value> = serde_json::from_str(payload)
        .map_err(|e| unusable(format!("the answers JSON is invalid ({e})")))?;

    let allowed = option_letters(spec.option_count);
    let mut read: Map<String, Value> = Map::new();
    for (raw_key, value) in raw {
        let number = raw_key
            .trim()
            .to_ascii_uppercase()
            .strip_prefix('Q')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| (1..=spec.question_count).contains(n));
        let Some(number) = number else {
            return Err(unusable(format!("unexpected question key {raw_key:?}")));
        };
        let key = format!("Q{number}");
        if read.contains_key(&key) {
            return Err(unusable(format!("{key} was read more than once ({raw_key:?})")));
        }

        let mark = value
            .as_str()
            .map(|s| s.trim().to_ascii_uppercase())
            .unwrap_or_default();
        let valid = mark == BLANK_MARK
            || mark == MULTIPLE_MARK
            || (mark.chars().count() == 1 && mark.chars().all(|c| allowed.contains(&c)));
        if !valid {
            return Err(unusable(format!("invalid mark {value} for {key}")));
        }
        read.insert(key, Value::String(mark));
    }

    let mut ordered = Map::new();
    for n in 1..=spec.question_count {
        let key = format!("Q{n}");
        let mark = read
            .remove(&key)
            .ok_or_else(|| unusable(format!("no answer was read for {key}")))?;
        ordered.insert(key, mark);
    }
    Ok(ordered)
}

/// Reads the marked answers off one answer-sheet image.
pub async fn read_answer_sheet(
    llm: &dyn Generator,
    model: &str,
    spec: SheetSpec,
) -> Result<Map<String, Value>, AppError> {
    let prompt = build_read_prompt(&spec);
    let request = GenerationRequest::text(model, prompt, 0.0).with_image(spec.image.clone());

    info!(
        "Reading answer sheet: {} questions, {} alternatives, {}",
        spec.question_count, spec.option_count, spec.image.mime_type
    );
    let reply = llm.generate(&request).await?;
    parse_sheet_reply(&reply, &spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::fake::FakeGenerator;

    fn spec(question_count: u32, option_count: usize) -> SheetSpec {
        SheetSpec {
            image: InlineImage {
                mime_type: DEFAULT_MIME_TYPE.to_string(),
                base64_data: "AAAA".to_string(),
            },
            question_count,
            option_count,
        }
    }

    #[test]
    fn test_validate_accepts_legacy_names_and_data_urls() {
        let request: ReadSheetRequest = serde_json::from_value(serde_json::json!({
            "base64Image": "data:image/png;base64,iVBORw0KGgo=",
            "numQuestoes": 10,
            "numAlternativas": 4
        }))
        .unwrap();
        let spec = request.validate().unwrap();
        assert_eq!(spec.image.mime_type, "image/png");
        assert_eq!(spec.image.base64_data, "iVBORw0KGgo=");
        assert_eq!(spec.question_count, 10);
        assert_eq!(spec.option_count, 4);
    }

    #[test]
    fn test_validate_rejects_missing_and_out_of_range_values() {
        let missing = ReadSheetRequest {
            base64_image: Some("AAAA".to_string()),
            question_count: None,
            option_count: Some(5),
            mime_type: None,
        };
        assert!(matches!(missing.validate(), Err(AppError::Validation(_))));

        let too_many_options = ReadSheetRequest {
            base64_image: Some("AAAA".to_string()),
            question_count: Some(10),
            option_count: Some(6),
            mime_type: None,
        };
        assert!(too_many_options.validate().is_err());
    }

    #[test]
    fn test_prompt_lists_allowed_letters() {
        let prompt = build_read_prompt(&spec(20, 4));
        assert!(prompt.contains("20 questions"));
        assert!(prompt.contains("(A, B, C, D)"));
        assert!(prompt.contains("\"Q20\": \"C\""));
    }

    #[test]
    fn test_reply_is_normalised_and_ordered() {
        let reply = "```json\n{\"q3\": \"-\", \"Q1\": \"a\", \"Q2\": \"X\"}\n```";
        let read = parse_sheet_reply(reply, &spec(3, 5)).unwrap();
        let pairs: Vec<(&str, &str)> = read
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("Q1", "A"), ("Q2", "X"), ("Q3", "-")]);
    }

    #[test]
    fn test_zero_padded_keys_are_canonicalised() {
        let reply = "```json\n{\"Q01\": \"a\", \"q02\": \"B\"}\n```";
        let read = parse_sheet_reply(reply, &spec(2, 5)).unwrap();
        assert_eq!(read, serde_json::from_str::<Map<String, Value>>(r#"{"Q1": "A", "Q2": "B"}"#).unwrap());
    }

    #[test]
    fn test_same_question_under_two_spellings_is_unusable() {
        let reply = "```json\n{\"q1\": \"A\", \"Q1\": \"B\", \"Q2\": \"C\"}\n```";
        let err = parse_sheet_reply(reply, &spec(2, 5)).unwrap_err();
        assert!(matches!(err, AppError::UnusableReply(_)));
        assert!(err.to_string().contains("Q1 was read more than once"), "{err}");
    }

    #[test]
    fn test_reply_with_letter_outside_range_is_unusable() {
        let reply = "```json\n{\"Q1\": \"E\"}\n```";
        assert!(matches!(
            parse_sheet_reply(reply, &spec(1, 4)),
            Err(AppError::UnusableReply(_))
        ));
    }

    #[test]
    fn test_reply_missing_question_is_unusable() {
        let reply = "```json\n{\"Q1\": \"A\"}\n```";
        let err = parse_sheet_reply(reply, &spec(2, 5)).unwrap_err();
        assert!(err.to_string().contains("Q2"), "{err}");
    }

    #[tokio::test]
    async fn test_read_sends_image_at_zero_temperature() {
        let fake = FakeGenerator::replying("```json\n{\"Q1\": \"B\"}\n```");
        let read = read_answer_sheet(&fake, "gemini-2.5-flash", spec(1, 5))
            .await
            .unwrap();
        assert_eq!(read["Q1"], "B");

        let request = &fake.requests()[0];
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.image.as_ref().unwrap().base64_data, "AAAA");
    }
}
