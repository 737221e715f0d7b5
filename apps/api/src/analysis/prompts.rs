// Prompt builder for the analysis pipeline.
// Batch 0 asks for records, batch-local metrics and the class narrative;
// every later batch asks for records only.

use serde_json::Value;

use crate::analysis::batcher::Batch;
use crate::analysis::roster::{AnswerKey, QuestionCount};
use crate::llm_client::prompts::{to_prompt_json, FENCED_JSON_INSTRUCTION};
use crate::llm_client::GenerationRequest;

/// Model parameters shared by every batch of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
}

/// Shape of one record, repeated in both prompt variants.
const RECORD_SCHEMA: &str = r#"{"name": "<student name exactly as given>", "correct_count": <integer>, "incorrect_count": <integer>, "percent_correct": <number with 2 decimals>, "total_questions": {question_count}}"#;

/// First-batch template. Replace: {fenced_json_instruction}, {record_schema},
/// {question_count}, {name_field}, {roster_json}
const FIRST_BATCH_TEMPLATE: &str = r#"You are a school performance analyst.
Correct and analyse the students below against the OFFICIAL ANSWER KEY, which is the first object of the data array. The column "{name_field}" holds the student name; every other column is one question.

OUTPUT INSTRUCTIONS (follow this order exactly):
1. DETAILED CORRECTION: a JSON array with one object for EVERY student in this data, in the same order:
   {record_schema}
   "total_questions" must be {question_count}.
2. KEY METRICS: after the JSON block, list the mean, the highest and the lowest number of correct answers for the students in this data only, as:
   **Mean correct:** ...
   **Highest score:** ...
   **Lowest score:** ...
3. GENERAL OBSERVATIONS: finish with a detailed qualitative analysis of about 300 words on the overall performance of the class: strengths, weaknesses and suggested teaching interventions.

{fenced_json_instruction}

DATA TO ANALYSE (answer key + students):
{roster_json}"#;

/// Continuation template. Replace: {fenced_json_instruction}, {record_schema},
/// {question_count}, {name_field}, {roster_json}
const CONTINUATION_TEMPLATE: &str = r#"Continue the correction.
You are a school performance analyst. Correct the students below against the OFFICIAL ANSWER KEY, which is the first object of the data array. The column "{name_field}" holds the student name; every other column is one question.

Your output must contain ONLY the JSON array, one object per student in the same order:
   {record_schema}
"total_questions" must be {question_count}.
Do NOT compute metrics. Do NOT write observations or any other text.

{fenced_json_instruction}

DATA TO ANALYSE (answer key + students):
{roster_json}"#;

/// Builds the generation request for one batch. Pure: same inputs, same request.
pub fn build_batch_request(
    batch: &Batch<'_>,
    answer_key: &AnswerKey,
    question_count: QuestionCount,
    settings: &GenerationSettings,
) -> GenerationRequest {
    let template = if batch.is_first() {
        FIRST_BATCH_TEMPLATE
    } else {
        CONTINUATION_TEMPLATE
    };

    let mut rows: Vec<Value> = Vec::with_capacity(batch.students.len() + 1);
    rows.push(Value::Object(answer_key.fields().clone()));
    rows.extend(
        batch
            .students
            .iter()
            .map(|s| Value::Object(s.fields().clone())),
    );

    let question_count = question_count.get().to_string();
    let prompt = template
        .replace("{fenced_json_instruction}", FENCED_JSON_INSTRUCTION)
        .replace("{record_schema}", RECORD_SCHEMA)
        .replace("{question_count}", &question_count)
        .replace("{name_field}", answer_key.name_field().unwrap_or("name"))
        .replace("{roster_json}", &to_prompt_json(&rows));

    GenerationRequest::text(&settings.model, prompt, settings.temperature)
}
