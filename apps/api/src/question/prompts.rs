// All LLM prompt constants for the question-generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Item-authoring prompt. Replace: {knowledge_area}, {curricular_component},
/// {knowledge_object}, {competency}, {skill}, {teaching_stage}, {difficulty},
/// {theme_and_context}, {fenced_json_instruction}
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"You are a high-proficiency item writer who builds ENEM-style preparatory exam questions. Produce one complete item aligned with the ENEM Reference Matrix and the national curriculum guidelines, using web search to ground the content and the support material.

METHOD
1. Curricular bases: use the BNCC, the state curriculum reference and the ENEM Reference Matrix (cognitive axes, competencies, skills) as mandatory references.
2. ENEM conformity: the item must follow the ENEM structure (support, statement, command, plausible distractors).
3. Content: guided by curricular component, knowledge object, teaching stage and difficulty, when given.
4. Theme and context: use them to contextualise the content.
5. Matrix alignment: prioritise the given competency and skill; if absent, choose the ones that best fit the knowledge object and theme.
6. Item structure: support (text, chart, table, quotation...), statement (context, no question), command (the clear question) and five alternatives A to E.
7. Use web search to find the support material and any facts you need.
8. Answer key: the correct letter (A, B, C, D or E).
9. Commented justification: why the answer is correct and what misconception each distractor targets.

PARAMETERS
* Knowledge area: {knowledge_area}
* Curricular component (required): {curricular_component}
* Knowledge object (required): {knowledge_object}
* Competency: {competency}
* Skill: {skill}
* Teaching stage: {teaching_stage}
* Item difficulty: {difficulty}
* Theme and context: {theme_and_context}

OUTPUT
Return ONLY one JSON object with exactly these keys and nothing before or after the block:
```json
{
  "curricular_component": "...",
  "competency_skill": "Area competency X / Skill Y (the values chosen in step 5)",
  "support": "Support text. Be descriptive; never use placeholders such as [IMAGE].",
  "statement": "Context of the problem, without the question.",
  "command": "The clear question that closes the statement.",
  "alternatives": {"A": "...", "B": "...", "C": "...", "D": "...", "E": "..."},
  "answer_key": "A letter from A to E",
  "commented_justification": "Why the answer is correct and the distractor role of each other alternative."
}
```

{fenced_json_instruction}"#;

pub const NOT_PROVIDED_CHOOSE: &str = "Not provided - choose the most suitable";
pub const NOT_PROVIDED: &str = "Not provided";
pub const DEFAULT_DIFFICULTY: &str = "Not provided (standard difficulty)";
