//! Static catalog of available providers, models, and voices.
//!
//! Served by the configuration-options endpoint so the frontend can populate
//! agent creation forms without hard-coding vendor IDs.

use crate::{LlmProviderId, SttProviderId};
use serde::Serialize;

/// A selectable model within an LLM provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogLlmModel {
    pub id: &'static str,
    pub name: &'static str,
}

/// An LLM provider and its selectable models.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogLlmProvider {
    pub id: LlmProviderId,
    pub name: &'static str,
    pub models: Vec<CatalogLlmModel>,
}

/// An STT provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogSttProvider {
    pub id: SttProviderId,
    pub name: &'static str,
    pub description: &'static str,
}

/// A selectable TTS voice (ElevenLabs voice IDs).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogTtsVoice {
    pub id: &'static str,
    pub name: &'static str,
}

/// The full options catalog returned by the API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderCatalog {
    pub llm_providers: Vec<CatalogLlmProvider>,
    pub stt_providers: Vec<CatalogSttProvider>,
    pub tts_voices: Vec<CatalogTtsVoice>,
}

/// Returns the static provider catalog.
pub fn provider_catalog() -> ProviderCatalog {
    ProviderCatalog {
        llm_providers: vec![
            CatalogLlmProvider {
                id: LlmProviderId::Gemini,
                name: "Google Gemini",
                models: vec![
                    CatalogLlmModel {
                        id: "gemini-1.5-flash",
                        name: "Gemini 1.5 Flash (Fastest)",
                    },
                    CatalogLlmModel {
                        id: "gemini-1.5-pro",
                        name: "Gemini 1.5 Pro (Most Capable)",
                    },
                    CatalogLlmModel {
                        id: "gemini-1.0-pro",
                        name: "Gemini 1.0 Pro",
                    },
                ],
            },
            CatalogLlmProvider {
                id: LlmProviderId::Groq,
                name: "Groq (Ultra-Fast)",
                models: vec![
                    CatalogLlmModel {
                        id: "llama-3.1-70b-versatile",
                        name: "Llama 3.1 70B (Recommended)",
                    },
                    CatalogLlmModel {
                        id: "llama-3.1-8b-instant",
                        name: "Llama 3.1 8B (Fastest)",
                    },
                    CatalogLlmModel {
                        id: "mixtral-8x7b-32768",
                        name: "Mixtral 8x7B",
                    },
                ],
            },
        ],
        stt_providers: vec![
            CatalogSttProvider {
                id: SttProviderId::Deepgram,
                name: "Deepgram (Recommended)",
                description: "Industry-leading STT with best accuracy and speed",
            },
            CatalogSttProvider {
                id: SttProviderId::Gemini,
                name: "Google Gemini",
                description: "Multimodal AI with good STT capabilities",
            },
        ],
        tts_voices: vec![
            CatalogTtsVoice { id: "21m00Tcm4TlvDq8ikWAM", name: "Rachel - Natural Female" },
            CatalogTtsVoice { id: "AZnzlk1XvdvUeBnXmlld", name: "Domi - Confident Female" },
            CatalogTtsVoice { id: "EXAVITQu4vr4xnSDxMaL", name: "Bella - Soft Female" },
            CatalogTtsVoice { id: "ErXwobaYiN019PkySvjV", name: "Antoni - Well-Rounded Male" },
            CatalogTtsVoice { id: "MF3mGyEYCl7XYWbV9V6O", name: "Elli - Emotional Female" },
            CatalogTtsVoice { id: "TxGEqnHWrfWFTfGW9XjX", name: "Josh - Deep Male" },
            CatalogTtsVoice { id: "VR6AewLTigWG4xSOukaG", name: "Arnold - Crisp Male" },
            CatalogTtsVoice { id: "pNInz6obpgDQGcFmaJgB", name: "Adam - Narrative Male" },
            CatalogTtsVoice { id: "yoZ06aMxZJJ28mfd3POQ", name: "Sam - Raspy Male" },
            CatalogTtsVoice { id: "onwK4e9ZLuTAKqWW03F9", name: "Daniel - Authoritative Male" },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_both_llm_providers() {
        let catalog = provider_catalog();
        let ids: Vec<_> = catalog.llm_providers.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![LlmProviderId::Gemini, LlmProviderId::Groq]);
        for provider in &catalog.llm_providers {
            assert!(!provider.models.is_empty());
        }
    }

    #[test]
    fn catalog_serializes_for_the_options_endpoint() {
        let value = serde_json::to_value(provider_catalog()).expect("catalog should serialize");
        assert_eq!(value["llm_providers"][0]["id"], "gemini");
        assert_eq!(value["stt_providers"][0]["id"], "deepgram");
        assert_eq!(value["tts_voices"].as_array().map(Vec::len), Some(10));
    }

    #[test]
    fn catalog_voice_ids_are_unique() {
        let catalog = provider_catalog();
        let mut ids: Vec<_> = catalog.tts_voices.iter().map(|v| v.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.tts_voices.len());
    }
}
