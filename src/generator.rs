use crate::config::DEFAULT_MAX_CONTRACT_CHARS;
use crate::llm_providers::LanguageModel;
use crate::utils::truncate_chars;
use crate::ContractError;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const INSTRUCTION_SUFFIX: &str = "以下のテキストから契約文を生成してください：";

const QUOTE_PAIRS: [(char, char); 6] = [
    ('"', '"'),
    ('\'', '\''),
    ('「', '」'),
    ('『', '』'),
    ('“', '”'),
    ('`', '`'),
];

/// Turns extracted page text into a single contract sentence.
#[derive(Clone)]
pub struct ContractGenerator {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
    max_contract_chars: usize,
}

impl ContractGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            max_contract_chars: DEFAULT_MAX_CONTRACT_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_contract_chars: usize) -> Self {
        self.max_contract_chars = max_contract_chars;
        self
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub fn build_prompt(&self, text: &str) -> String {
        format!("{}\n\n{INSTRUCTION_SUFFIX}\n\n{text}", self.system_prompt)
    }

    #[instrument(level = "debug", skip_all, fields(provider = self.model.name(), text_chars = text.chars().count()))]
    pub async fn generate(&self, text: &str) -> Result<String, ContractError> {
        let prompt = self.build_prompt(text);
        let raw = self.model.generate(&prompt).await?;
        let contract = self.post_process(&raw)?;
        info!(chars = contract.chars().count(), "Contract sentence generated");
        Ok(contract)
    }

    /// Single line, unquoted, at most `max_contract_chars` characters.
    ///
    /// An over-long reply keeps its first sentence when that sentence fits,
    /// otherwise it is cut hard at the limit. The model is never re-asked.
    pub fn post_process(&self, raw: &str) -> Result<String, ContractError> {
        let single_line: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
            .collect();
        let contract = strip_quotes(single_line.trim()).trim();

        if contract.is_empty() {
            return Err(ContractError::EmptyResponse);
        }

        let length = contract.chars().count();
        if length <= self.max_contract_chars {
            return Ok(contract.to_string());
        }

        if let Some(end) = contract.find('。') {
            let first_sentence = &contract[..end + '。'.len_utf8()];
            if first_sentence.chars().count() <= self.max_contract_chars {
                debug!(length, "Kept first sentence of over-long contract");
                return Ok(first_sentence.to_string());
            }
        }

        debug!(length, limit = self.max_contract_chars, "Hard-truncating contract");
        Ok(truncate_chars(contract, self.max_contract_chars).to_string())
    }
}

fn strip_quotes(text: &str) -> &str {
    let mut current = text;
    loop {
        let mut chars = current.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return current;
        };
        match QUOTE_PAIRS.iter().find(|(open, close)| *open == first && *close == last) {
            Some(_) => {
                current = current[first.len_utf8()..current.len() - last.len_utf8()].trim();
            }
            None => return current,
        }
    }
}
