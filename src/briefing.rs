//! Patient briefing text for a set of findings.
//!
//! Best-effort: a local Ollama model writes the briefing when reachable,
//! otherwise a fixed summary is produced. Nothing here can fail the
//! interpretation of a report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Classification, Finding};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "phi";

#[derive(Error, Debug)]
pub enum BriefingError {
    #[error("No Ollama server reachable at {0}")]
    Connection(String),

    #[error("Ollama answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client: {0}")]
    HttpClient(String),

    #[error("Unusable Ollama reply: {0}")]
    ResponseParsing(String),
}

/// Produces a free-text briefing for the patient.
pub trait BriefingGenerator {
    fn generate(&self, findings: &[Finding], specialties: &[String])
        -> Result<String, BriefingError>;
}

/// Briefing written by a model served by Ollama.
pub struct OllamaBriefing {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaBriefing {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, BriefingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BriefingError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Non-streaming `/api/generate` call.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

impl BriefingGenerator for OllamaBriefing {
    fn generate(
        &self,
        findings: &[Finding],
        specialties: &[String],
    ) -> Result<String, BriefingError> {
        let endpoint = format!("{}/api/generate", self.base_url);
        let prompt = build_prompt(findings, specialties);
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    BriefingError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    BriefingError::HttpClient(format!("no reply within {}s", self.timeout_secs))
                } else {
                    BriefingError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BriefingError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let reply: GenerateReply = response
            .json()
            .map_err(|e| BriefingError::ResponseParsing(e.to_string()))?;

        let text = reply.response.trim();
        if text.is_empty() {
            return Err(BriefingError::ResponseParsing("empty response".into()));
        }
        Ok(text.to_string())
    }
}

/// Fixed-text briefing. Never fails.
pub struct StaticBriefing;

impl StaticBriefing {
    pub fn text(findings: &[Finding], specialties: &[String]) -> String {
        if findings.is_empty() {
            return "Nenhum valor fora da faixa de referência foi identificado nos \
                    analitos reconhecidos. Leve o laudo completo à sua próxima consulta."
                .to_string();
        }

        let mut text = format!(
            "Foram identificados {} achado(s) fora da faixa de referência: {}.",
            findings.len(),
            summarize(findings)
        );
        if !specialties.is_empty() {
            text.push_str(&format!(
                " Especialidades sugeridas: {}.",
                specialties.join(", ")
            ));
        }
        text.push_str(" Leve este resumo à consulta e discuta os resultados com o médico.");
        text
    }
}

impl BriefingGenerator for StaticBriefing {
    fn generate(
        &self,
        findings: &[Finding],
        specialties: &[String],
    ) -> Result<String, BriefingError> {
        Ok(Self::text(findings, specialties))
    }
}

/// Run `generator`, falling back to [`StaticBriefing`] on any error.
pub fn briefing_or_fallback(
    generator: &dyn BriefingGenerator,
    findings: &[Finding],
    specialties: &[String],
) -> String {
    match generator.generate(findings, specialties) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Briefing generation failed, using static text");
            StaticBriefing::text(findings, specialties)
        }
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Low => "baixo",
        Classification::High => "alto",
    }
}

fn summarize(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| {
            format!(
                "{} {} (severidade {})",
                f.display_name,
                classification_label(f.classification),
                f.severity
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_prompt(findings: &[Finding], specialties: &[String]) -> String {
    let specialists = if specialties.is_empty() {
        "clínica geral".to_string()
    } else {
        specialties.join(", ")
    };
    format!(
        "Você é um assistente de saúde. Meu exame apresentou os seguintes achados: {}. \
         Vou consultar um especialista em {}. O que posso relatar ao médico?",
        summarize(findings),
        specialists
    )
}
