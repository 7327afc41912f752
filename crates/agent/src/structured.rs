//! Structured output: typed values extracted from model text.
//!
//! `generate_structured` asks the model for JSON matching a type's schema,
//! then deserializes the reply. A reply that does not fit the type is fed
//! back as a corrective prompt; the retry budget bounds those rounds before
//! the failure surfaces as `StructuredError::SchemaUnmet`.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use baton_core::error::{Error, Result, StructuredError};
use baton_core::params::RequestParams;

use crate::reasoning::ReasoningLoop;

impl ReasoningLoop {
    /// Run one invocation and parse the reply into `T`.
    pub async fn generate_structured<T>(
        &mut self,
        input: &str,
        params: &RequestParams,
    ) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        self.generate_structured_cancellable(input, params, &CancellationToken::new())
            .await
    }

    /// Like [`generate_structured`](Self::generate_structured), aborting with
    /// `Error::Cancelled` when the token fires.
    pub async fn generate_structured_cancellable<T>(
        &mut self,
        input: &str,
        params: &RequestParams,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = schemars::SchemaGenerator::default().into_root_schema_for::<T>();
        let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

        let mut prompt = format!(
            "{input}\n\nRespond with a single JSON object matching this schema. \
             Output only the JSON, no prose and no code fences.\n\nSchema:\n{schema_json}"
        );
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let outcome = self.generate_cancellable(&prompt, params, cancel).await?;
            let candidate = extract_json(&outcome.text);

            match serde_json::from_str::<T>(candidate) {
                Ok(value) => {
                    debug!(attempts, "Structured output parsed");
                    return Ok(value);
                }
                Err(e) => {
                    let reason = e.to_string();
                    if attempts > self.structured_retries {
                        return Err(Error::Structured(StructuredError::SchemaUnmet {
                            attempts,
                            reason,
                        }));
                    }
                    warn!(attempts, error = %reason, "Structured output did not parse, re-prompting");
                    prompt = format!(
                        "Your previous reply could not be parsed: {reason}. \
                         Respond again with only a JSON object matching the schema.\n\n\
                         Schema:\n{schema_json}"
                    );
                }
            }
        }
    }
}

/// Pull the JSON payload out of a model reply: strips code fences and trims
/// prose around the outermost object or array.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    let open = unfenced.find(['{', '[']);
    let close = unfenced.rfind(['}', ']']);
    match (open, close) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}
