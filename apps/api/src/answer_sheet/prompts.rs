// All LLM prompt constants for the answer-sheet reader.

/// Sheet-reading prompt. Replace: {question_count}, {option_count},
/// {option_letters}, {last_question}, {fenced_json_instruction}
pub const READ_SHEET_PROMPT_TEMPLATE: &str = r#"You are a highly accurate answer-sheet reader.
Analyse the attached image of a filled-in answer sheet and extract the marked answer for each question.

READING RULES
1. The sheet has {question_count} questions.
2. Each question has {option_count} alternatives ({option_letters}).
3. If a question has exactly one clear mark, return that letter.
4. If a question was left blank, return "-".
5. If a question has more than one mark (erasure or double marking), return "X".

OUTPUT
A single JSON object. Keys are the question numbers "Q1" to "Q{question_count}", values are the answers read.
Example:
```json
{"Q1": "A", "Q2": "X", "Q3": "-", "Q{last_question}": "C"}
```
Do not include any introduction, explanation or extra code. Only the JSON block.

{fenced_json_instruction}"#;
