//! Prompt construction for model requests.
//!
//! Both prompts are rebuilt on every call and always interpolate the current
//! schema text verbatim.

use crate::extractor::QueryCandidate;
use crate::results::ResultSet;
use crate::schema::SchemaDescriptor;

/// System prompt template for turning questions into SQL.
const QUERY_PROMPT_TEMPLATE: &str = r#"You are a data assistant connected to a MySQL database. You answer questions about the data by writing SQL queries.

DATABASE SCHEMA:
{schema}

INSTRUCTIONS:
- If the question can be answered from the database, reply with ONLY the SQL SELECT statement
- Do not wrap the SQL in markdown, JSON, or explanations
- Only generate SELECT statements; never modify data
- Limit results to 100 rows unless the user specifies otherwise
- If the question is not about the data, or cannot be answered with the schema, reply conversationally in plain text"#;

/// System prompt template for explaining an executed query's results.
const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are a data assistant connected to a MySQL database. A query was just executed on the user's behalf.

DATABASE SCHEMA:
{schema}

USER QUESTION:
{question}

EXECUTED SQL:
{sql}

QUERY RESULTS (JSON array of rows):
{results}

INSTRUCTIONS:
- Answer the user's question using only the results above
- Summarize in plain language; do not repeat the SQL
- If the results are empty, say that no matching data was found"#;

/// Fixed final message sent with the analysis prompt.
pub const ANALYSIS_INSTRUCTION: &str =
    "Explain these query results to me in plain language, answering my question.";

/// Builds the system prompt for query generation.
pub fn build_system_prompt(schema: &SchemaDescriptor) -> String {
    QUERY_PROMPT_TEMPLATE.replace("{schema}", schema.as_str())
}

/// Builds the system prompt for explaining results.
///
/// The full result set is embedded as a JSON array.
pub fn build_analysis_prompt(
    schema: &SchemaDescriptor,
    question: &str,
    candidate: &QueryCandidate,
    results: &ResultSet,
) -> String {
    // Single pass so that placeholder text inside the substituted values is left alone.
    let mut out = String::with_capacity(ANALYSIS_PROMPT_TEMPLATE.len() + 256);
    let mut rest = ANALYSIS_PROMPT_TEMPLATE;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let key = &rest[start + 1..start + len];
        let value = match key {
            "schema" => schema.as_str().to_string(),
            "question" => question.to_string(),
            "sql" => candidate.sql.clone(),
            "results" => results.to_json(),
            _ => rest[start..=start + len].to_string(),
        };
        out.push_str(&rest[..start]);
        out.push_str(&value);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}
